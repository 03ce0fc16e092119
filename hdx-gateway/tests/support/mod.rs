use async_trait::async_trait;
use hdx_gateway::model::{
    BridgeEntry, BridgeProfile, ConsentManagerEntry, RoutingEntry, ServiceEndpoint, ServiceProfile,
    ServiceRole,
};
use hdx_gateway::relay::dispatch::{DispatchError, DispatchRequest, Dispatcher};
use hdx_gateway::{GatewayError, RegistryStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Registry store exposing only the routing-resolution surface; relay flows
/// never touch the mutation queries.
#[derive(Default)]
pub(crate) struct RouteTableStore {
    cms: Mutex<HashMap<String, RoutingEntry>>,
    services: Mutex<HashMap<(String, ServiceRole), RoutingEntry>>,
}

impl RouteTableStore {
    pub(crate) fn add_cm(&self, suffix: &str, base_url: &str) {
        self.cms.lock().unwrap().insert(
            suffix.to_string(),
            RoutingEntry {
                id: suffix.to_string(),
                base_url: base_url.to_string(),
                active: true,
                blocklisted: false,
            },
        );
    }

    pub(crate) fn add_service(&self, service_id: &str, role: ServiceRole, base_url: &str) {
        self.services.lock().unwrap().insert(
            (service_id.to_string(), role),
            RoutingEntry {
                id: service_id.to_string(),
                base_url: base_url.to_string(),
                active: true,
                blocklisted: false,
            },
        );
    }
}

#[async_trait]
impl RegistryStore for RouteTableStore {
    async fn find_consent_manager(
        &self,
        _suffix: &str,
    ) -> Result<Option<ConsentManagerEntry>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn create_consent_manager(
        &self,
        _entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn update_consent_manager(
        &self,
        _entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn find_bridge(&self, _bridge_id: &str) -> Result<Option<BridgeEntry>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn create_bridge(&self, _entry: &BridgeEntry) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn update_bridge(&self, _entry: &BridgeEntry) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn service_exists_for_other_bridge(
        &self,
        _service_id: &str,
        _role: ServiceRole,
        _excluding_bridge_id: &str,
    ) -> Result<bool, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn bridge_service_exists(
        &self,
        _bridge_id: &str,
        _service_id: &str,
    ) -> Result<bool, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn insert_bridge_service(
        &self,
        _bridge_id: &str,
        _service_id: &str,
        _name: &str,
        _role_active: &HashMap<ServiceRole, bool>,
        _endpoints: &[ServiceEndpoint],
    ) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn update_bridge_service(
        &self,
        _bridge_id: &str,
        _service_id: &str,
        _name: &str,
        _role_active: &HashMap<ServiceRole, bool>,
    ) -> Result<(), GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn list_active_services_for_bridge(
        &self,
        _bridge_id: &str,
    ) -> Result<Vec<(String, ServiceRole)>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn list_services_by_role(
        &self,
        _role: ServiceRole,
    ) -> Result<Vec<ServiceProfile>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn service_profile(
        &self,
        _service_id: &str,
    ) -> Result<Option<ServiceProfile>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn bridge_profile(
        &self,
        _bridge_id: &str,
    ) -> Result<Option<BridgeProfile>, GatewayError> {
        unimplemented!("not used in relay tests")
    }

    async fn resolve_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        Ok(self.cms.lock().unwrap().get(suffix).cloned())
    }

    async fn resolve_bridge_service(
        &self,
        service_id: &str,
        role: ServiceRole,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        Ok(self
            .services
            .lock()
            .unwrap()
            .get(&(service_id.to_string(), role))
            .cloned())
    }
}

/// Dispatcher that records every request and can be flipped into failure
/// mode.
#[derive(Default)]
pub(crate) struct RecordingDispatcher {
    pub(crate) fail: AtomicBool,
    requests: Mutex<Vec<DispatchRequest>>,
}

impl RecordingDispatcher {
    pub(crate) fn requests(&self) -> Vec<DispatchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail.load(Ordering::Relaxed) {
            Err(DispatchError::Rejected { status: 503 })
        } else {
            Ok(())
        }
    }
}

pub(crate) async fn eventually(predicate: impl Fn() -> bool) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
