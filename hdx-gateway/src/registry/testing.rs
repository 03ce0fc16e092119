//! In-memory [`RegistryStore`] used by unit tests across the crate.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::GatewayError;
use crate::registry::model::{
    BridgeEntry, BridgeProfile, ConsentManagerEntry, RoutingEntry, ServiceEndpoint, ServiceProfile,
    ServiceRole,
};
use crate::registry::store::RegistryStore;

#[derive(Clone, Debug)]
pub(crate) struct StoredService {
    pub bridge_id: String,
    pub service_id: String,
    pub name: String,
    pub active: bool,
    pub roles: HashMap<ServiceRole, bool>,
    pub endpoints: Vec<ServiceEndpoint>,
}

#[derive(Default)]
struct State {
    cms: HashMap<String, ConsentManagerEntry>,
    bridges: HashMap<String, BridgeEntry>,
    services: Vec<StoredService>,
    cm_route_reads: usize,
    service_route_reads: usize,
}

/// Hash-map registry store with read counters so tests can observe
/// cache-aside behavior.
#[derive(Default)]
pub(crate) struct InMemoryRegistryStore {
    state: Mutex<State>,
}

impl InMemoryRegistryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn put_cm_route(&self, suffix: &str, entry: RoutingEntry) {
        self.state.lock().await.cms.insert(
            suffix.to_string(),
            ConsentManagerEntry {
                suffix: suffix.to_string(),
                name: String::new(),
                url: entry.base_url,
                active: entry.active,
                blocklisted: entry.blocklisted,
            },
        );
    }

    pub(crate) async fn put_service_route(
        &self,
        service_id: &str,
        role: ServiceRole,
        entry: RoutingEntry,
    ) {
        let bridge_id = format!("{service_id}-bridge");
        let mut state = self.state.lock().await;
        state.bridges.insert(
            bridge_id.clone(),
            BridgeEntry {
                id: bridge_id.clone(),
                name: String::new(),
                url: entry.base_url,
                active: entry.active,
                blocklisted: entry.blocklisted,
            },
        );
        state.services.push(StoredService {
            bridge_id,
            service_id: service_id.to_string(),
            name: String::new(),
            active: true,
            roles: HashMap::from([(role, true)]),
            endpoints: Vec::new(),
        });
    }

    pub(crate) async fn add_service(&self, service: StoredService) {
        self.state.lock().await.services.push(service);
    }

    pub(crate) async fn cm(&self, suffix: &str) -> Option<ConsentManagerEntry> {
        self.state.lock().await.cms.get(suffix).cloned()
    }

    pub(crate) async fn bridge(&self, bridge_id: &str) -> Option<BridgeEntry> {
        self.state.lock().await.bridges.get(bridge_id).cloned()
    }

    pub(crate) async fn service(
        &self,
        bridge_id: &str,
        service_id: &str,
    ) -> Option<StoredService> {
        self.state
            .lock()
            .await
            .services
            .iter()
            .find(|service| service.bridge_id == bridge_id && service.service_id == service_id)
            .cloned()
    }

    pub(crate) async fn cm_route_reads(&self) -> usize {
        self.state.lock().await.cm_route_reads
    }

    pub(crate) async fn service_route_reads(&self) -> usize {
        self.state.lock().await.service_route_reads
    }

    fn profile_for(services: &[&StoredService]) -> Option<ServiceProfile> {
        let last = services.last()?;
        let mut roles = Vec::new();
        let mut endpoints = Vec::new();
        for service in services {
            for role in ServiceRole::ALL {
                if service.roles.get(&role).copied().unwrap_or(false) && !roles.contains(&role) {
                    roles.push(role);
                }
            }
            endpoints.extend(service.endpoints.clone());
        }
        Some(ServiceProfile {
            id: last.service_id.clone(),
            name: last.name.clone(),
            active: last.active,
            roles,
            endpoints,
        })
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistryStore {
    async fn find_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<ConsentManagerEntry>, GatewayError> {
        Ok(self.state.lock().await.cms.get(suffix).cloned())
    }

    async fn create_consent_manager(
        &self,
        entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .await
            .cms
            .insert(entry.suffix.clone(), entry.clone());
        Ok(())
    }

    async fn update_consent_manager(
        &self,
        entry: &ConsentManagerEntry,
    ) -> Result<(), GatewayError> {
        self.state
            .lock()
            .await
            .cms
            .insert(entry.suffix.clone(), entry.clone());
        Ok(())
    }

    async fn find_bridge(&self, bridge_id: &str) -> Result<Option<BridgeEntry>, GatewayError> {
        Ok(self.state.lock().await.bridges.get(bridge_id).cloned())
    }

    async fn create_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError> {
        self.state
            .lock()
            .await
            .bridges
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn update_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError> {
        self.state
            .lock()
            .await
            .bridges
            .insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn service_exists_for_other_bridge(
        &self,
        service_id: &str,
        role: ServiceRole,
        excluding_bridge_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self.state.lock().await.services.iter().any(|service| {
            service.service_id == service_id
                && service.bridge_id != excluding_bridge_id
                && service.roles.get(&role).copied().unwrap_or(false)
        }))
    }

    async fn bridge_service_exists(
        &self,
        bridge_id: &str,
        service_id: &str,
    ) -> Result<bool, GatewayError> {
        Ok(self
            .state
            .lock()
            .await
            .services
            .iter()
            .any(|service| service.bridge_id == bridge_id && service.service_id == service_id))
    }

    async fn insert_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
        endpoints: &[ServiceEndpoint],
    ) -> Result<(), GatewayError> {
        self.state.lock().await.services.push(StoredService {
            bridge_id: bridge_id.to_string(),
            service_id: service_id.to_string(),
            name: name.to_string(),
            active: true,
            roles: role_active.clone(),
            endpoints: endpoints.to_vec(),
        });
        Ok(())
    }

    async fn update_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
    ) -> Result<(), GatewayError> {
        let mut state = self.state.lock().await;
        if let Some(service) = state
            .services
            .iter_mut()
            .find(|service| service.bridge_id == bridge_id && service.service_id == service_id)
        {
            service.name = name.to_string();
            for (role, active) in role_active {
                service.roles.insert(*role, *active);
            }
        }
        Ok(())
    }

    async fn list_active_services_for_bridge(
        &self,
        bridge_id: &str,
    ) -> Result<Vec<(String, ServiceRole)>, GatewayError> {
        let state = self.state.lock().await;
        let mut services = Vec::new();
        for service in state
            .services
            .iter()
            .filter(|service| service.bridge_id == bridge_id && service.active)
        {
            for role in ServiceRole::ALL {
                if service.roles.get(&role).copied().unwrap_or(false) {
                    services.push((service.service_id.clone(), role));
                }
            }
        }
        Ok(services)
    }

    async fn list_services_by_role(
        &self,
        role: ServiceRole,
    ) -> Result<Vec<ServiceProfile>, GatewayError> {
        let state = self.state.lock().await;
        Ok(state
            .services
            .iter()
            .filter(|service| service.roles.get(&role).copied().unwrap_or(false))
            .map(|service| {
                Self::profile_for(&[service]).expect("non-empty slice always yields a profile")
            })
            .collect())
    }

    async fn service_profile(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceProfile>, GatewayError> {
        let state = self.state.lock().await;
        let matching: Vec<&StoredService> = state
            .services
            .iter()
            .filter(|service| service.service_id == service_id)
            .collect();
        Ok(Self::profile_for(&matching))
    }

    async fn bridge_profile(
        &self,
        bridge_id: &str,
    ) -> Result<Option<BridgeProfile>, GatewayError> {
        Ok(self
            .state
            .lock()
            .await
            .bridges
            .get(bridge_id)
            .map(|bridge| BridgeProfile {
                id: bridge.id.clone(),
                name: bridge.name.clone(),
                url: bridge.url.clone(),
                active: bridge.active,
                blocklisted: bridge.blocklisted,
                created_at: Utc::now(),
                modified_at: Utc::now(),
            }))
    }

    async fn resolve_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        let mut state = self.state.lock().await;
        state.cm_route_reads += 1;
        Ok(state.cms.get(suffix).map(|cm| RoutingEntry {
            id: cm.suffix.clone(),
            base_url: cm.url.clone(),
            active: cm.active,
            blocklisted: cm.blocklisted,
        }))
    }

    async fn resolve_bridge_service(
        &self,
        service_id: &str,
        role: ServiceRole,
    ) -> Result<Option<RoutingEntry>, GatewayError> {
        let mut state = self.state.lock().await;
        state.service_route_reads += 1;
        let Some(service) = state.services.iter().find(|service| {
            service.service_id == service_id
                && service.active
                && service.roles.get(&role).copied().unwrap_or(false)
        }) else {
            return Ok(None);
        };
        Ok(state.bridges.get(&service.bridge_id).map(|bridge| RoutingEntry {
            id: service.service_id.clone(),
            base_url: bridge.url.clone(),
            active: bridge.active,
            blocklisted: bridge.blocklisted,
        }))
    }
}
