//! Caller authentication via identity-provider token introspection.
//!
//! The introspected client id is the only origin identity the relay layer
//! trusts; actor-id headers are routing data, not identity.

use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::Deserialize;

/// Authenticated caller of one inbound request.
#[derive(Clone, Debug)]
pub(crate) struct Caller {
    pub(crate) client_id: String,
}

#[derive(Debug)]
pub(crate) enum AuthError {
    MissingToken,
    Unauthorized,
    Provider(reqwest::Error),
}

impl Display for AuthError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "missing bearer token"),
            AuthError::Unauthorized => write!(f, "token is not active"),
            AuthError::Provider(err) => write!(f, "introspection failed: {err}"),
        }
    }
}

impl Error for AuthError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AuthError::Provider(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Introspection {
    active: bool,
    #[serde(default)]
    client_id: Option<String>,
}

pub(crate) struct Authenticator {
    client: reqwest::Client,
    introspection_url: String,
    client_id: String,
    client_secret: String,
}

impl Authenticator {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: &str,
        realm: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            introspection_url: format!(
                "{base_url}/realms/{realm}/protocol/openid-connect/token/introspect"
            ),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Resolves the authenticated caller from an `Authorization` header
    /// value.
    pub(crate) async fn caller_from_bearer(
        &self,
        authorization: Option<&str>,
    ) -> Result<Caller, AuthError> {
        let token = authorization
            .and_then(|value| value.strip_prefix("Bearer "))
            .filter(|token| !token.trim().is_empty())
            .ok_or(AuthError::MissingToken)?;

        let response = self
            .client
            .post(&self.introspection_url)
            .form(&[
                ("token", token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(AuthError::Provider)?
            .error_for_status()
            .map_err(AuthError::Provider)?;

        let introspection: Introspection =
            response.json().await.map_err(AuthError::Provider)?;
        if !introspection.active {
            return Err(AuthError::Unauthorized);
        }
        introspection
            .client_id
            .filter(|id| !id.is_empty())
            .map(|client_id| Caller { client_id })
            .ok_or(AuthError::Unauthorized)
    }
}
