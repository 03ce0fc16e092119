//! HTTP surface: exchange routes, callback routes, and the registry admin
//! API.
//!
//! Exchange routes return 202 as soon as admission succeeds; callback routes
//! return 202 regardless of relay outcome, since relay failures are terminal
//! at the gateway and observable only through logs.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, warn};

use hdx_gateway::model::{BridgeRequest, BridgeServiceRequest, ConsentManagerRequest};
use hdx_gateway::relay::{
    PATH_CARE_CONTEXTS_DISCOVER, PATH_CARE_CONTEXTS_ON_DISCOVER, PATH_LINK_INIT, PATH_LINK_ON_INIT,
};
use hdx_gateway::{
    GatewayError, InboundRequest, RegistryService, RequestOrchestrator, ResponseOrchestrator,
};

use crate::auth::Authenticator;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) authenticator: Arc<Authenticator>,
    pub(crate) registry: Arc<RegistryService>,
    pub(crate) discover_requests: Arc<RequestOrchestrator>,
    pub(crate) discover_callbacks: Arc<ResponseOrchestrator>,
    pub(crate) link_requests: Arc<RequestOrchestrator>,
    pub(crate) link_callbacks: Arc<ResponseOrchestrator>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route(PATH_CARE_CONTEXTS_DISCOVER, post(discover))
        .route(PATH_CARE_CONTEXTS_ON_DISCOVER, post(on_discover))
        .route(PATH_LINK_INIT, post(link_init))
        .route(PATH_LINK_ON_INIT, post(on_link_init))
        .route("/internal/cm", put(register_cm))
        .route("/internal/bridges", put(register_bridge))
        .route(
            "/internal/bridges/{bridge_id}/services",
            put(register_bridge_services),
        )
        .route("/internal/bridges/{bridge_id}", get(bridge_profile))
        .route("/internal/services/{service_id}", get(service_profile))
        .route("/internal/services", get(services_of_type))
        .route("/facilities/search", get(search_facility))
        .route("/facilities/{facility_id}", get(facility_by_id))
        .with_state(state)
}

fn inbound_from(headers: &HeaderMap, body: String) -> InboundRequest {
    let mut request = InboundRequest::new(body);
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request = request.with_header(name.as_str(), value);
        }
    }
    request
}

fn error_response(err: GatewayError) -> Response {
    let status = match &err {
        GatewayError::InvalidRequest(_) | GatewayError::MalformedCallback(_) => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::TargetUnreachable { .. }
        | GatewayError::UnknownCorrelation { .. }
        | GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::DuplicateRequest { .. } | GatewayError::RoleConflict { .. } => {
            StatusCode::CONFLICT
        }
        GatewayError::StoreOperationFailed(_)
        | GatewayError::IdentityProviderFailed(_)
        | GatewayError::FacilityDirectoryFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({
        "error": { "code": err.kind(), "message": err.to_string() }
    });
    (status, Json(body)).into_response()
}

async fn exchange_request(
    state: &AppState,
    orchestrator: &RequestOrchestrator,
    headers: HeaderMap,
    body: String,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    let caller = match state.authenticator.caller_from_bearer(authorization).await {
        Ok(caller) => caller,
        Err(err) => {
            warn!(err = %err, "rejecting unauthenticated exchange request");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let request = inbound_from(&headers, body);
    match orchestrator.handle(&caller.client_id, &request).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(err) => error_response(err),
    }
}

/// Callbacks are acknowledged with 202 no matter what; their failures are
/// logged by the orchestrator and never surfaced to the sender.
async fn exchange_callback(
    state: &AppState,
    orchestrator: &ResponseOrchestrator,
    headers: HeaderMap,
    body: String,
) -> Response {
    let authorization = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok());
    if let Err(err) = state.authenticator.caller_from_bearer(authorization).await {
        warn!(err = %err, "rejecting unauthenticated callback");
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let request = inbound_from(&headers, body);
    if let Err(err) = orchestrator.handle(&request).await {
        debug!(err = %err, "callback dropped");
    }
    StatusCode::ACCEPTED.into_response()
}

async fn discover(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let orchestrator = state.discover_requests.clone();
    exchange_request(&state, &orchestrator, headers, body).await
}

async fn on_discover(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let orchestrator = state.discover_callbacks.clone();
    exchange_callback(&state, &orchestrator, headers, body).await
}

async fn link_init(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let orchestrator = state.link_requests.clone();
    exchange_request(&state, &orchestrator, headers, body).await
}

async fn on_link_init(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let orchestrator = state.link_callbacks.clone();
    exchange_callback(&state, &orchestrator, headers, body).await
}

async fn register_cm(
    State(state): State<AppState>,
    Json(request): Json<ConsentManagerRequest>,
) -> Response {
    match state.registry.register_consent_manager(request).await {
        Ok(Some(credentials)) => (StatusCode::OK, Json(credentials)).into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn register_bridge(
    State(state): State<AppState>,
    Json(request): Json<BridgeRequest>,
) -> Response {
    match state.registry.register_bridge(request).await {
        Ok(Some(credentials)) => (StatusCode::OK, Json(credentials)).into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn register_bridge_services(
    State(state): State<AppState>,
    Path(bridge_id): Path<String>,
    Json(requests): Json<Vec<BridgeServiceRequest>>,
) -> Response {
    match state
        .registry
        .register_bridge_services(&bridge_id, requests)
        .await
    {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn bridge_profile(State(state): State<AppState>, Path(bridge_id): Path<String>) -> Response {
    match state.registry.bridge_profile(&bridge_id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => error_response(err),
    }
}

async fn service_profile(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> Response {
    match state.registry.service_profile(&service_id).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => error_response(err),
    }
}

async fn services_of_type(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let role = params.get("type").map(String::as_str).unwrap_or_default();
    match state.registry.services_of_type(role).await {
        Ok(services) => Json(services).into_response(),
        Err(err) => error_response(err),
    }
}

async fn search_facility(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let name = params.get("name").map(String::as_str).unwrap_or_default();
    match state
        .registry
        .search_facility_by_name(
            name,
            params.get("stateCode").map(String::as_str),
            params.get("districtCode").map(String::as_str),
        )
        .await
    {
        Ok(facilities) => Json(facilities).into_response(),
        Err(err) => error_response(err),
    }
}

async fn facility_by_id(
    State(state): State<AppState>,
    Path(facility_id): Path<String>,
) -> Response {
    match state.registry.facility_by_id(&facility_id).await {
        Ok(facility) => Json(facility).into_response(),
        Err(err) => error_response(err),
    }
}
