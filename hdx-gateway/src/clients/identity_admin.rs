//! Identity-provider administrative client.
//!
//! Provisions and deprovisions per-actor credentials and assigns realm roles
//! matching each active capability. The HTTP binding targets a Keycloak-style
//! realm-admin REST API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::GatewayError;

/// Service account backing a provisioned client.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccount {
    pub id: String,
}

/// A realm role as reported by the identity provider.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RealmRole {
    pub id: String,
    pub name: String,
}

/// Administrative operations on the identity provider.
#[async_trait]
pub trait IdentityAdmin: Send + Sync {
    async fn create_client(&self, client_id: &str) -> Result<(), GatewayError>;

    async fn create_client_if_not_exists(&self, client_id: &str) -> Result<(), GatewayError>;

    async fn delete_client(&self, client_id: &str) -> Result<(), GatewayError>;

    async fn delete_client_if_exists(&self, client_id: &str) -> Result<(), GatewayError>;

    async fn client_secret(&self, client_id: &str) -> Result<String, GatewayError>;

    async fn service_account(&self, client_id: &str) -> Result<ServiceAccount, GatewayError>;

    async fn available_realm_roles(
        &self,
        service_account_id: &str,
    ) -> Result<Vec<RealmRole>, GatewayError>;

    async fn assign_role_to_client(
        &self,
        roles: Vec<RealmRole>,
        service_account_id: &str,
    ) -> Result<(), GatewayError>;
}

fn identity_failure(err: reqwest::Error) -> GatewayError {
    GatewayError::IdentityProviderFailed(Box::new(err))
}

#[derive(Clone, Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Clone, Debug, Deserialize)]
struct SecretResponse {
    value: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ClientRepresentation {
    id: String,
}

/// Keycloak-style admin REST binding. Obtains a fresh admin bearer token per
/// operation via the client-credentials grant.
pub struct HttpIdentityAdmin {
    client: reqwest::Client,
    base_url: String,
    realm: String,
    admin_client_id: String,
    admin_client_secret: String,
}

impl HttpIdentityAdmin {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        realm: impl Into<String>,
        admin_client_id: impl Into<String>,
        admin_client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            realm: realm.into(),
            admin_client_id: admin_client_id.into(),
            admin_client_secret: admin_client_secret.into(),
        }
    }

    fn admin_url(&self, path: &str) -> String {
        format!("{}/admin/realms/{}{}", self.base_url, self.realm, path)
    }

    async fn admin_token(&self) -> Result<String, GatewayError> {
        let token_url = format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.base_url, self.realm
        );
        let response = self
            .client
            .post(token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.admin_client_id.as_str()),
                ("client_secret", self.admin_client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        let token: TokenResponse = response.json().await.map_err(identity_failure)?;
        Ok(token.access_token)
    }

    /// Looks up the provider-internal id for a client, absent when the client
    /// does not exist.
    async fn internal_client_id(
        &self,
        token: &str,
        client_id: &str,
    ) -> Result<Option<String>, GatewayError> {
        let response = self
            .client
            .get(self.admin_url("/clients"))
            .query(&[("clientId", client_id)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        let clients: Vec<ClientRepresentation> =
            response.json().await.map_err(identity_failure)?;
        Ok(clients.into_iter().next().map(|client| client.id))
    }

    async fn create_client_raw(&self, token: &str, client_id: &str) -> Result<(), GatewayError> {
        self.client
            .post(self.admin_url("/clients"))
            .bearer_auth(token)
            .json(&json!({
                "clientId": client_id,
                "serviceAccountsEnabled": true,
                "standardFlowEnabled": false,
            }))
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        Ok(())
    }
}

#[async_trait]
impl IdentityAdmin for HttpIdentityAdmin {
    async fn create_client(&self, client_id: &str) -> Result<(), GatewayError> {
        let token = self.admin_token().await?;
        self.create_client_raw(&token, client_id).await
    }

    async fn create_client_if_not_exists(&self, client_id: &str) -> Result<(), GatewayError> {
        let token = self.admin_token().await?;
        if self.internal_client_id(&token, client_id).await?.is_none() {
            self.create_client_raw(&token, client_id).await?;
        }
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> Result<(), GatewayError> {
        let token = self.admin_token().await?;
        let internal_id = self
            .internal_client_id(&token, client_id)
            .await?
            .ok_or(GatewayError::NotFound("identity-provider client"))?;
        self.client
            .delete(self.admin_url(&format!("/clients/{internal_id}")))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        Ok(())
    }

    async fn delete_client_if_exists(&self, client_id: &str) -> Result<(), GatewayError> {
        match self.delete_client(client_id).await {
            Err(GatewayError::NotFound(_)) => Ok(()),
            outcome => outcome,
        }
    }

    async fn client_secret(&self, client_id: &str) -> Result<String, GatewayError> {
        let token = self.admin_token().await?;
        let internal_id = self
            .internal_client_id(&token, client_id)
            .await?
            .ok_or(GatewayError::NotFound("identity-provider client"))?;
        let response = self
            .client
            .get(self.admin_url(&format!("/clients/{internal_id}/client-secret")))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        let secret: SecretResponse = response.json().await.map_err(identity_failure)?;
        Ok(secret.value)
    }

    async fn service_account(&self, client_id: &str) -> Result<ServiceAccount, GatewayError> {
        let token = self.admin_token().await?;
        let internal_id = self
            .internal_client_id(&token, client_id)
            .await?
            .ok_or(GatewayError::NotFound("identity-provider client"))?;
        let response = self
            .client
            .get(self.admin_url(&format!(
                "/clients/{internal_id}/service-account-user"
            )))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        response.json().await.map_err(identity_failure)
    }

    async fn available_realm_roles(
        &self,
        service_account_id: &str,
    ) -> Result<Vec<RealmRole>, GatewayError> {
        let token = self.admin_token().await?;
        let response = self
            .client
            .get(self.admin_url(&format!(
                "/users/{service_account_id}/role-mappings/realm/available"
            )))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        response.json().await.map_err(identity_failure)
    }

    async fn assign_role_to_client(
        &self,
        roles: Vec<RealmRole>,
        service_account_id: &str,
    ) -> Result<(), GatewayError> {
        let token = self.admin_token().await?;
        self.client
            .post(self.admin_url(&format!(
                "/users/{service_account_id}/role-mappings/realm"
            )))
            .bearer_auth(&token)
            .json(&roles)
            .send()
            .await
            .map_err(identity_failure)?
            .error_for_status()
            .map_err(identity_failure)?;
        Ok(())
    }
}
