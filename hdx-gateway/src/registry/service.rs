//! Validated registry mutations, client provisioning, and cache invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clients::facility::{DirectoryFacility, FacilityDirectory, FACILITY_ACTIVE};
use crate::clients::identity_admin::IdentityAdmin;
use crate::error::GatewayError;
use crate::observability::events;
use crate::registry::model::{
    BridgeEntry, BridgeProfile, BridgeRequest, BridgeServiceRequest, ClientCredentials,
    CombinedServiceRole, ConsentManagerEntry, ConsentManagerRequest, FacilityRepresentation,
    ServiceEndpoint, ServiceProfileResponse, ServiceRole,
};
use crate::registry::store::RegistryStore;
use crate::routing::RoutingResolver;

const COMPONENT: &str = "registry_service";
const CM_REALM_ROLE: &str = "CM";

/// Applies registry mutations and keeps the routing cache and the
/// identity provider consistent with them.
///
/// Every mutation sequences its store write strictly before the matching
/// cache invalidation, so the cache is never more stale than "not yet
/// invalidated".
pub struct RegistryService {
    store: Arc<dyn RegistryStore>,
    routing: Arc<RoutingResolver>,
    identity: Arc<dyn IdentityAdmin>,
    facility: Arc<dyn FacilityDirectory>,
}

impl RegistryService {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        routing: Arc<RoutingResolver>,
        identity: Arc<dyn IdentityAdmin>,
        facility: Arc<dyn FacilityDirectory>,
    ) -> Self {
        Self {
            store,
            routing,
            identity,
            facility,
        }
    }

    /// Registers a new consent manager or updates an existing one.
    ///
    /// Returns fresh credentials when the mutation flipped the entry to
    /// active (or created it); `None` when the active status did not change
    /// or the entry was deactivated.
    pub async fn register_consent_manager(
        &self,
        request: ConsentManagerRequest,
    ) -> Result<Option<ClientCredentials>, GatewayError> {
        if request.suffix.trim().is_empty() || request.url.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "consent-manager suffix and url must be non-blank".to_string(),
            ));
        }

        let entry = ConsentManagerEntry {
            suffix: request.suffix.clone(),
            name: request.name.clone(),
            url: request.url.clone(),
            active: request.active.unwrap_or(true),
            blocklisted: request.blocklisted.unwrap_or(false),
        };

        match self.store.find_consent_manager(&entry.suffix).await? {
            None => {
                if !entry.active {
                    return Err(GatewayError::InvalidRequest(
                        "cannot register an inactive consent manager".to_string(),
                    ));
                }
                self.store.create_consent_manager(&entry).await?;
                info!(
                    event = events::CM_REGISTERED,
                    component = COMPONENT,
                    cm_suffix = entry.suffix.as_str(),
                    "consent manager registered"
                );
                let credentials = self
                    .provision_client_with_role(&entry.suffix, CM_REALM_ROLE)
                    .await?;
                Ok(Some(credentials))
            }
            Some(previous) => {
                self.store.update_consent_manager(&entry).await?;
                self.routing.invalidate_consent_manager(&entry.suffix).await;
                info!(
                    event = events::CM_UPDATED,
                    component = COMPONENT,
                    cm_suffix = entry.suffix.as_str(),
                    active = entry.active,
                    "consent manager updated"
                );
                self.reconcile_cm_client(&previous, &entry).await
            }
        }
    }

    async fn reconcile_cm_client(
        &self,
        previous: &ConsentManagerEntry,
        current: &ConsentManagerEntry,
    ) -> Result<Option<ClientCredentials>, GatewayError> {
        if previous.active == current.active {
            return Ok(None);
        }
        if current.active {
            let credentials = self
                .provision_client_with_role(&current.suffix, CM_REALM_ROLE)
                .await?;
            return Ok(Some(credentials));
        }
        self.identity.delete_client(&current.suffix).await?;
        info!(
            event = events::CLIENT_DEPROVISIONED,
            component = COMPONENT,
            cm_suffix = current.suffix.as_str(),
            "identity-provider client deleted"
        );
        Ok(None)
    }

    async fn provision_client_with_role(
        &self,
        client_id: &str,
        realm_role: &str,
    ) -> Result<ClientCredentials, GatewayError> {
        self.identity.create_client(client_id).await?;
        self.assign_realm_role(client_id, realm_role).await?;
        let secret = self.identity.client_secret(client_id).await?;
        info!(
            event = events::CLIENT_PROVISIONED,
            component = COMPONENT,
            client_id,
            "identity-provider client provisioned"
        );
        Ok(ClientCredentials {
            id: client_id.to_string(),
            secret,
        })
    }

    async fn assign_realm_role(&self, client_id: &str, role_name: &str) -> Result<(), GatewayError> {
        let account = self.identity.service_account(client_id).await?;
        let roles = self.identity.available_realm_roles(&account.id).await?;
        match roles
            .into_iter()
            .find(|role| role.name.eq_ignore_ascii_case(role_name))
        {
            Some(role) => {
                self.identity
                    .assign_role_to_client(vec![role], &account.id)
                    .await
            }
            None => {
                warn!(
                    event = events::REALM_ROLE_MISSING,
                    component = COMPONENT,
                    client_id,
                    role = role_name,
                    "no matching realm role available; assignment skipped"
                );
                Ok(())
            }
        }
    }

    /// Registers a new bridge or applies a partial-update-by-merge to an
    /// existing one. First registration must be explicitly active.
    pub async fn register_bridge(
        &self,
        request: BridgeRequest,
    ) -> Result<Option<ClientCredentials>, GatewayError> {
        if request.id.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "bridge id must be non-blank".to_string(),
            ));
        }

        match self.store.find_bridge(&request.id).await? {
            Some(previous) => {
                let merged = BridgeEntry {
                    id: previous.id.clone(),
                    name: request.name.unwrap_or(previous.name),
                    url: request.url.unwrap_or(previous.url),
                    active: request.active.unwrap_or(previous.active),
                    blocklisted: request.blocklisted.unwrap_or(previous.blocklisted),
                };
                self.store.update_bridge(&merged).await?;
                // The bridge's own flags decide service-level routability, so
                // every known service entry of this bridge is now stale.
                for (service_id, role) in
                    self.store.list_active_services_for_bridge(&merged.id).await?
                {
                    self.routing.invalidate_bridge_service(&service_id, role).await;
                }
                info!(
                    event = events::BRIDGE_UPDATED,
                    component = COMPONENT,
                    bridge_id = merged.id.as_str(),
                    active = merged.active,
                    "bridge updated"
                );
                if merged.active {
                    let credentials = self.provision_bridge_client(&merged.id).await?;
                    Ok(Some(credentials))
                } else {
                    self.identity.delete_client_if_exists(&merged.id).await?;
                    info!(
                        event = events::CLIENT_DEPROVISIONED,
                        component = COMPONENT,
                        bridge_id = merged.id.as_str(),
                        "identity-provider client deleted"
                    );
                    Ok(None)
                }
            }
            None => match request.active {
                None => Err(GatewayError::InvalidRequest(
                    "bridge registration must state active".to_string(),
                )),
                Some(false) => Err(GatewayError::InvalidRequest(
                    "cannot register an inactive bridge".to_string(),
                )),
                Some(true) => {
                    let entry = BridgeEntry {
                        id: request.id.clone(),
                        name: request.name.unwrap_or_default(),
                        url: request.url.unwrap_or_default(),
                        active: true,
                        blocklisted: request.blocklisted.unwrap_or(false),
                    };
                    self.store.create_bridge(&entry).await?;
                    info!(
                        event = events::BRIDGE_REGISTERED,
                        component = COMPONENT,
                        bridge_id = entry.id.as_str(),
                        "bridge registered"
                    );
                    let credentials = self.provision_bridge_client(&entry.id).await?;
                    Ok(Some(credentials))
                }
            },
        }
    }

    async fn provision_bridge_client(
        &self,
        bridge_id: &str,
    ) -> Result<ClientCredentials, GatewayError> {
        self.identity.create_client_if_not_exists(bridge_id).await?;
        let secret = self.identity.client_secret(bridge_id).await?;
        info!(
            event = events::CLIENT_PROVISIONED,
            component = COMPONENT,
            client_id = bridge_id,
            "identity-provider client provisioned"
        );
        Ok(ClientCredentials {
            id: bridge_id.to_string(),
            secret,
        })
    }

    /// Registers or updates the services a bridge fronts. Requests are
    /// grouped by service id and merged into one row per service.
    pub async fn register_bridge_services(
        &self,
        bridge_id: &str,
        requests: Vec<BridgeServiceRequest>,
    ) -> Result<(), GatewayError> {
        let mut groups: Vec<(String, Vec<BridgeServiceRequest>)> = Vec::new();
        for request in requests {
            match groups.iter().position(|(id, _)| *id == request.id) {
                Some(index) => groups[index].1.push(request),
                None => groups.push((request.id.clone(), vec![request])),
            }
        }

        for (service_id, group) in groups {
            for request in group.iter().filter(|request| request.active) {
                if self
                    .store
                    .service_exists_for_other_bridge(&service_id, request.role, bridge_id)
                    .await?
                {
                    warn!(
                        event = events::SERVICE_ROLE_CONFLICT,
                        component = COMPONENT,
                        bridge_id,
                        service_id = service_id.as_str(),
                        role = %request.role,
                        "service id already claimed under this role by another bridge"
                    );
                    return Err(GatewayError::RoleConflict {
                        service_id,
                        role: request.role,
                    });
                }
                self.assign_realm_role(bridge_id, request.role.realm_role_name())
                    .await?;
            }

            let name = group[0].name.clone();
            let endpoints: Vec<ServiceEndpoint> = group
                .iter()
                .flat_map(|request| request.endpoints.clone())
                .collect();
            let mut role_active: HashMap<ServiceRole, bool> = HashMap::new();
            for request in &group {
                role_active.insert(request.role, request.active);
            }

            if self.store.bridge_service_exists(bridge_id, &service_id).await? {
                self.store
                    .update_bridge_service(bridge_id, &service_id, &name, &role_active)
                    .await?;
                for role in role_active.keys() {
                    self.routing
                        .invalidate_bridge_service(&service_id, *role)
                        .await;
                }
            } else {
                self.store
                    .insert_bridge_service(bridge_id, &service_id, &name, &role_active, &endpoints)
                    .await?;
            }
            info!(
                event = events::BRIDGE_SERVICE_UPSERTED,
                component = COMPONENT,
                bridge_id,
                service_id = service_id.as_str(),
                "bridge service upserted"
            );
        }
        Ok(())
    }

    /// Reads one service profile with its derived combined role. A service
    /// that exists but holds no roles yields `role: None`, which is distinct
    /// from not-found.
    pub async fn service_profile(
        &self,
        service_id: &str,
    ) -> Result<ServiceProfileResponse, GatewayError> {
        let profile = self
            .store
            .service_profile(service_id)
            .await?
            .ok_or(GatewayError::NotFound("service"))?;
        Ok(ServiceProfileResponse {
            id: profile.id,
            name: profile.name,
            active: profile.active,
            role: derive_combined_role(&profile.roles),
            endpoints: profile.endpoints,
        })
    }

    /// Lists services active under one role. An unrecognized role spelling
    /// yields an empty result rather than an error.
    pub async fn services_of_type(
        &self,
        role_value: &str,
    ) -> Result<Vec<ServiceProfileResponse>, GatewayError> {
        let Some(role) = ServiceRole::parse(role_value) else {
            return Ok(Vec::new());
        };
        let combined = match role {
            ServiceRole::Provider => CombinedServiceRole::Provider,
            ServiceRole::Consumer => CombinedServiceRole::Consumer,
            ServiceRole::HealthLocker => CombinedServiceRole::HealthLocker,
        };
        let profiles = self.store.list_services_by_role(role).await?;
        Ok(profiles
            .into_iter()
            .map(|profile| ServiceProfileResponse {
                id: profile.id,
                name: profile.name,
                active: profile.active,
                role: Some(combined),
                endpoints: profile.endpoints,
            })
            .collect())
    }

    pub async fn bridge_profile(&self, bridge_id: &str) -> Result<BridgeProfile, GatewayError> {
        self.store
            .bridge_profile(bridge_id)
            .await?
            .ok_or(GatewayError::NotFound("bridge"))
    }

    /// Searches the external facility directory and annotates each hit with
    /// this gateway's own provider-role marker.
    pub async fn search_facility_by_name(
        &self,
        name: &str,
        state_code: Option<&str>,
        district_code: Option<&str>,
    ) -> Result<Vec<FacilityRepresentation>, GatewayError> {
        if name.trim().is_empty() {
            return Ok(Vec::new());
        }
        let facilities = self
            .facility
            .search_facility_by_name(name, state_code, district_code)
            .await?;
        let mut annotated = Vec::with_capacity(facilities.len());
        for facility in facilities {
            annotated.push(self.annotate_facility(facility).await?);
        }
        Ok(annotated)
    }

    pub async fn facility_by_id(
        &self,
        facility_id: &str,
    ) -> Result<FacilityRepresentation, GatewayError> {
        let facility = self.facility.facility_by_id(facility_id).await?;
        if facility.id.trim().is_empty() {
            return Err(GatewayError::NotFound("facility"));
        }
        self.annotate_facility(facility).await
    }

    async fn annotate_facility(
        &self,
        facility: DirectoryFacility,
    ) -> Result<FacilityRepresentation, GatewayError> {
        let mut representation = FacilityRepresentation {
            id: facility.id.clone(),
            name: facility.name,
            telephone: facility.contact_number,
            city: facility.address.city,
            facility_roles: Vec::new(),
            is_provider: false,
        };
        if let Some(profile) = self.store.service_profile(&facility.id).await? {
            let directory_active = facility.active == FACILITY_ACTIVE;
            representation.is_provider =
                profile.roles.contains(&ServiceRole::Provider) && directory_active;
            representation.facility_roles = profile.roles;
        }
        Ok(representation)
    }
}

/// Derives the single combined role classification from stored role flags.
fn derive_combined_role(roles: &[ServiceRole]) -> Option<CombinedServiceRole> {
    let provider = roles.contains(&ServiceRole::Provider);
    let consumer = roles.contains(&ServiceRole::Consumer);
    if roles.contains(&ServiceRole::HealthLocker) {
        Some(CombinedServiceRole::HealthLocker)
    } else if provider && consumer {
        Some(CombinedServiceRole::ProviderAndConsumer)
    } else if provider {
        Some(CombinedServiceRole::Provider)
    } else if consumer {
        Some(CombinedServiceRole::Consumer)
    } else {
        None
    }
}
