//! Gateway-level error kinds shared by the registry, routing, and relay layers.

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::registry::model::ServiceRole;

type Source = Box<dyn Error + Send + Sync>;

/// Failure kinds surfaced by gateway operations.
///
/// Admission failures (`InvalidRequest`, `TargetUnreachable`,
/// `DuplicateRequest`) reach the caller synchronously; everything that can
/// only happen after a request was admitted is terminal at the gateway and
/// observable through logs alone.
#[derive(Debug)]
pub enum GatewayError {
    /// A required field was missing or blank.
    InvalidRequest(String),
    /// The addressed target is unknown, inactive, or blocklisted.
    TargetUnreachable { target_id: String },
    /// The correlation id is already pending an answer.
    DuplicateRequest { correlation_id: String },
    /// The callback carried no extractable correlation id.
    MalformedCallback(String),
    /// The callback's correlation id was never issued, already consumed, or
    /// expired.
    UnknownCorrelation { correlation_id: String },
    /// The service id is already claimed under this role by another bridge.
    RoleConflict {
        service_id: String,
        role: ServiceRole,
    },
    /// Opaque persistence failure.
    StoreOperationFailed(Source),
    /// The requested registry entity does not exist.
    NotFound(&'static str),
    /// The identity-provider administrative API failed.
    IdentityProviderFailed(Source),
    /// The external facility directory failed.
    FacilityDirectoryFailed(Source),
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayError::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            GatewayError::TargetUnreachable { target_id } => {
                write!(f, "target {target_id} is unknown, inactive, or blocklisted")
            }
            GatewayError::DuplicateRequest { correlation_id } => {
                write!(f, "request {correlation_id} is already pending")
            }
            GatewayError::MalformedCallback(reason) => {
                write!(f, "malformed callback: {reason}")
            }
            GatewayError::UnknownCorrelation { correlation_id } => {
                write!(f, "no pending request for correlation id {correlation_id}")
            }
            GatewayError::RoleConflict { service_id, role } => {
                write!(
                    f,
                    "service {service_id} is already active as {role} under another bridge"
                )
            }
            GatewayError::StoreOperationFailed(_) => write!(f, "store operation failed"),
            GatewayError::NotFound(entity) => write!(f, "{entity} not found"),
            GatewayError::IdentityProviderFailed(_) => {
                write!(f, "identity provider operation failed")
            }
            GatewayError::FacilityDirectoryFailed(_) => {
                write!(f, "facility directory lookup failed")
            }
        }
    }
}

impl Error for GatewayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            GatewayError::StoreOperationFailed(source)
            | GatewayError::IdentityProviderFailed(source)
            | GatewayError::FacilityDirectoryFailed(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl GatewayError {
    /// Stable machine-readable kind used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::TargetUnreachable { .. } => "target_unreachable",
            GatewayError::DuplicateRequest { .. } => "duplicate_request",
            GatewayError::MalformedCallback(_) => "malformed_callback",
            GatewayError::UnknownCorrelation { .. } => "unknown_correlation",
            GatewayError::RoleConflict { .. } => "role_conflict",
            GatewayError::StoreOperationFailed(_) => "store_operation_failed",
            GatewayError::NotFound(_) => "not_found",
            GatewayError::IdentityProviderFailed(_) => "identity_provider_failed",
            GatewayError::FacilityDirectoryFailed(_) => "facility_directory_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GatewayError;
    use crate::registry::model::ServiceRole;
    use std::error::Error;

    #[test]
    fn store_failure_chains_its_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let error = GatewayError::StoreOperationFailed(Box::new(inner));

        assert_eq!(error.to_string(), "store operation failed");
        assert!(error.source().is_some());
    }

    #[test]
    fn role_conflict_display_names_service_and_role() {
        let error = GatewayError::RoleConflict {
            service_id: "s1".to_string(),
            role: ServiceRole::Provider,
        };

        assert_eq!(
            error.to_string(),
            "service s1 is already active as provider under another bridge"
        );
        assert_eq!(error.kind(), "role_conflict");
        assert!(error.source().is_none());
    }
}
