//! Read-only client for the external facility directory.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;

/// Directory-side marker for an operational facility.
pub const FACILITY_ACTIVE: &str = "Y";

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DirectoryAddress {
    #[serde(default)]
    pub city: String,
}

/// A facility as reported by the directory, before local annotation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryFacility {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// `"Y"` when the directory marks the facility operational.
    #[serde(default)]
    pub active: String,
    #[serde(default)]
    pub contact_number: String,
    #[serde(default)]
    pub address: DirectoryAddress,
}

/// External facility directory lookups.
#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn search_facility_by_name(
        &self,
        name: &str,
        state_code: Option<&str>,
        district_code: Option<&str>,
    ) -> Result<Vec<DirectoryFacility>, GatewayError>;

    async fn facility_by_id(&self, facility_id: &str)
        -> Result<DirectoryFacility, GatewayError>;
}

fn directory_failure(err: reqwest::Error) -> GatewayError {
    GatewayError::FacilityDirectoryFailed(Box::new(err))
}

#[derive(Clone, Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    facilities: Vec<DirectoryFacility>,
}

#[derive(Clone, Debug, Deserialize)]
struct FacilityResponse {
    facility: DirectoryFacility,
}

/// HTTP binding for the facility directory.
pub struct HttpFacilityDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFacilityDirectory {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl FacilityDirectory for HttpFacilityDirectory {
    async fn search_facility_by_name(
        &self,
        name: &str,
        state_code: Option<&str>,
        district_code: Option<&str>,
    ) -> Result<Vec<DirectoryFacility>, GatewayError> {
        let response = self
            .client
            .post(format!("{}/facility/search", self.base_url))
            .json(&json!({
                "name": name,
                "stateCode": state_code,
                "districtCode": district_code,
            }))
            .send()
            .await
            .map_err(directory_failure)?
            .error_for_status()
            .map_err(directory_failure)?;
        let search: SearchResponse = response.json().await.map_err(directory_failure)?;
        Ok(search.facilities)
    }

    async fn facility_by_id(
        &self,
        facility_id: &str,
    ) -> Result<DirectoryFacility, GatewayError> {
        let response = self
            .client
            .get(format!("{}/facility/{facility_id}", self.base_url))
            .send()
            .await
            .map_err(directory_failure)?
            .error_for_status()
            .map_err(directory_failure)?;
        let facility: FacilityResponse = response.json().await.map_err(directory_failure)?;
        Ok(facility.facility)
    }
}
