//! Query contract for the relational registry store.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::registry::model::{
    BridgeEntry, BridgeProfile, ConsentManagerEntry, RoutingEntry, ServiceEndpoint, ServiceProfile,
    ServiceRole,
};

/// Point lookups and upserts over the three registry tables
/// (`consent_manager`, `bridge`, `bridge_service`). Every operation is
/// query/single-result or query/multi-result shaped; any driver failure
/// surfaces as the opaque [`GatewayError::StoreOperationFailed`].
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn find_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<ConsentManagerEntry>, GatewayError>;

    async fn create_consent_manager(&self, entry: &ConsentManagerEntry)
        -> Result<(), GatewayError>;

    /// Full-column overwrite except the identifying `suffix`.
    async fn update_consent_manager(&self, entry: &ConsentManagerEntry)
        -> Result<(), GatewayError>;

    async fn find_bridge(&self, bridge_id: &str) -> Result<Option<BridgeEntry>, GatewayError>;

    async fn create_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError>;

    async fn update_bridge(&self, entry: &BridgeEntry) -> Result<(), GatewayError>;

    /// True when `service_id` is already active under `role` for a bridge
    /// other than `excluding_bridge_id`.
    async fn service_exists_for_other_bridge(
        &self,
        service_id: &str,
        role: ServiceRole,
        excluding_bridge_id: &str,
    ) -> Result<bool, GatewayError>;

    async fn bridge_service_exists(
        &self,
        bridge_id: &str,
        service_id: &str,
    ) -> Result<bool, GatewayError>;

    async fn insert_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
        endpoints: &[ServiceEndpoint],
    ) -> Result<(), GatewayError>;

    /// Updates only the supplied role-active columns and the name.
    async fn update_bridge_service(
        &self,
        bridge_id: &str,
        service_id: &str,
        name: &str,
        role_active: &HashMap<ServiceRole, bool>,
    ) -> Result<(), GatewayError>;

    /// `(service_id, role)` pairs currently active under the bridge; used to
    /// invalidate routing-cache entries after a bridge-level mutation.
    async fn list_active_services_for_bridge(
        &self,
        bridge_id: &str,
    ) -> Result<Vec<(String, ServiceRole)>, GatewayError>;

    async fn list_services_by_role(
        &self,
        role: ServiceRole,
    ) -> Result<Vec<ServiceProfile>, GatewayError>;

    async fn service_profile(
        &self,
        service_id: &str,
    ) -> Result<Option<ServiceProfile>, GatewayError>;

    async fn bridge_profile(&self, bridge_id: &str)
        -> Result<Option<BridgeProfile>, GatewayError>;

    /// Routing resolution for the consent-manager namespace. Status flags are
    /// returned as stored; the caller decides routability.
    async fn resolve_consent_manager(
        &self,
        suffix: &str,
    ) -> Result<Option<RoutingEntry>, GatewayError>;

    /// Routing resolution for the bridge-service namespace: joins `bridge`
    /// and `bridge_service` on `bridge_id` and requires the service active
    /// under `role`. The returned entry carries the bridge's own status
    /// flags and base URL.
    async fn resolve_bridge_service(
        &self,
        service_id: &str,
        role: ServiceRole,
    ) -> Result<Option<RoutingEntry>, GatewayError>;
}
