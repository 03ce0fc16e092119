//! Registry entity, request, and projection types.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Capability roles a bridge-fronted service can hold. A service may be
/// simultaneously active for several roles.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRole {
    Provider,
    Consumer,
    HealthLocker,
}

impl ServiceRole {
    pub const ALL: [ServiceRole; 3] = [
        ServiceRole::Provider,
        ServiceRole::Consumer,
        ServiceRole::HealthLocker,
    ];

    /// Parses the wire spelling; unknown spellings are `None` so read APIs
    /// can degrade to an empty result instead of an error.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "provider" => Some(ServiceRole::Provider),
            "consumer" => Some(ServiceRole::Consumer),
            "health_locker" | "health-locker" => Some(ServiceRole::HealthLocker),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceRole::Provider => "provider",
            ServiceRole::Consumer => "consumer",
            ServiceRole::HealthLocker => "health_locker",
        }
    }

    /// Realm-role spelling used by the identity provider.
    pub fn realm_role_name(&self) -> &'static str {
        match self {
            ServiceRole::Provider => "PROVIDER",
            ServiceRole::Consumer => "CONSUMER",
            ServiceRole::HealthLocker => "HEALTH_LOCKER",
        }
    }
}

impl Display for ServiceRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Combined role classification derived for profile reads: health-locker wins
/// outright, provider+consumer collapses into one marker.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinedServiceRole {
    Provider,
    Consumer,
    HealthLocker,
    ProviderAndConsumer,
}

/// The class of actor an id belongs to, deciding which registry namespace
/// resolves it and which header namespace identifies it on the wire.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ActorClass {
    ConsentManager,
    Service(ServiceRole),
}

impl ActorClass {
    pub fn routing_key(&self, id: &str) -> RoutingKey {
        match self {
            ActorClass::ConsentManager => RoutingKey::ConsentManager {
                suffix: id.to_string(),
            },
            ActorClass::Service(role) => RoutingKey::BridgeService {
                service_id: id.to_string(),
                role: *role,
            },
        }
    }
}

/// Cache/lookup key for one addressable actor.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum RoutingKey {
    ConsentManager {
        suffix: String,
    },
    BridgeService {
        service_id: String,
        role: ServiceRole,
    },
}

impl Display for RoutingKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingKey::ConsentManager { suffix } => write!(f, "cm:{suffix}"),
            RoutingKey::BridgeService { service_id, role } => {
                write!(f, "service:{service_id}:{role}")
            }
        }
    }
}

/// Resolved address and status for one addressable actor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RoutingEntry {
    pub id: String,
    pub base_url: String,
    pub active: bool,
    pub blocklisted: bool,
}

impl RoutingEntry {
    /// An inactive or blocklisted entry must never be used as a forwarding
    /// target; lookups treat it as not-found.
    pub fn is_routable(&self) -> bool {
        self.active && !self.blocklisted
    }
}

/// One addressable path offered by a bridge service.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub name: String,
    pub address: String,
}

/// Stored consent-manager row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsentManagerEntry {
    pub suffix: String,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub blocklisted: bool,
}

/// Inbound consent-manager registration/update request. Unset `active` and
/// `blocklisted` take their defaults before any store write.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentManagerRequest {
    pub suffix: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    pub active: Option<bool>,
    pub blocklisted: Option<bool>,
}

/// Stored bridge row.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BridgeEntry {
    pub id: String,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub blocklisted: bool,
}

/// Inbound bridge registration/update request. On update, unset fields
/// inherit the stored entry's values.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRequest {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub active: Option<bool>,
    pub blocklisted: Option<bool>,
}

/// One service registration line item; several line items for the same
/// service id merge into one stored row.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeServiceRequest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub role: ServiceRole,
    pub active: bool,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
}

/// Stored service row projected by id.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServiceProfile {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub roles: Vec<ServiceRole>,
    pub endpoints: Vec<ServiceEndpoint>,
}

/// Profile read response with the derived combined role. `role` is `None`
/// only for a service that exists but holds no roles.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProfileResponse {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub role: Option<CombinedServiceRole>,
    pub endpoints: Vec<ServiceEndpoint>,
}

/// Bridge profile projection for read APIs.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeProfile {
    pub id: String,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub blocklisted: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Credentials returned when an identity-provider client is provisioned.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ClientCredentials {
    pub id: String,
    pub secret: String,
}

/// Facility-directory result annotated with this gateway's own provider-role
/// marker.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityRepresentation {
    pub id: String,
    pub name: String,
    pub telephone: String,
    pub city: String,
    pub facility_roles: Vec<ServiceRole>,
    pub is_provider: bool,
}

#[cfg(test)]
mod tests {
    use super::{RoutingEntry, ServiceRole};

    #[test]
    fn role_parse_accepts_known_spellings_only() {
        assert_eq!(ServiceRole::parse("provider"), Some(ServiceRole::Provider));
        assert_eq!(ServiceRole::parse("CONSUMER"), Some(ServiceRole::Consumer));
        assert_eq!(
            ServiceRole::parse("health-locker"),
            Some(ServiceRole::HealthLocker)
        );
        assert_eq!(ServiceRole::parse("radiology"), None);
    }

    #[test]
    fn blocklisted_entry_is_not_routable() {
        let entry = RoutingEntry {
            id: "hip-9".to_string(),
            base_url: "https://hip-9.example".to_string(),
            active: true,
            blocklisted: true,
        };

        assert!(!entry.is_routable());
    }

    #[test]
    fn inactive_entry_is_not_routable() {
        let entry = RoutingEntry {
            id: "hip-9".to_string(),
            base_url: "https://hip-9.example".to_string(),
            active: false,
            blocklisted: false,
        };

        assert!(!entry.is_routable());
    }
}
