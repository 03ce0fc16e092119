//! End-to-end exercise of the correlation engine: a consent manager's
//! request forwarded to a provider, the provider's callback relayed back.

mod support;

use hdx_gateway::model::ServiceRole;
use hdx_gateway::relay::{CM_ID_HEADER, GATEWAY_ID_HEADER, PROVIDER_ID_HEADER};
use hdx_gateway::{
    CallbackKind, CorrelationMap, DispatchPool, ExchangeKind, GatewayError, InboundRequest,
    RequestOrchestrator, ResponseOrchestrator, RoutingResolver,
};
use std::sync::Arc;
use std::time::Duration;
use support::{eventually, RecordingDispatcher, RouteTableStore};
use uuid::Uuid;

const CORRELATION_TTL: Duration = Duration::from_secs(120);
const ROUTING_TTL: Duration = Duration::from_secs(600);

struct Gateway {
    store: Arc<RouteTableStore>,
    correlations: Arc<CorrelationMap>,
    forward_dispatcher: Arc<RecordingDispatcher>,
    relay_dispatcher: Arc<RecordingDispatcher>,
    requests: RequestOrchestrator,
    responses: ResponseOrchestrator,
}

fn gateway() -> Gateway {
    let store = Arc::new(RouteTableStore::default());
    let routing = Arc::new(RoutingResolver::new(store.clone(), ROUTING_TTL));
    let correlations = Arc::new(CorrelationMap::new(CORRELATION_TTL));
    let forward_dispatcher = Arc::new(RecordingDispatcher::default());
    let relay_dispatcher = Arc::new(RecordingDispatcher::default());

    let requests = RequestOrchestrator::new(
        ExchangeKind::care_contexts_discover(),
        "hdx-gateway",
        routing.clone(),
        correlations.clone(),
        DispatchPool::new(forward_dispatcher.clone(), 2, 32),
    );
    let responses = ResponseOrchestrator::new(
        CallbackKind::on_discover(),
        "hdx-gateway",
        routing,
        correlations.clone(),
        relay_dispatcher.clone(),
    );

    Gateway {
        store,
        correlations,
        forward_dispatcher,
        relay_dispatcher,
        requests,
        responses,
    }
}

fn discover_request(correlation_id: &str) -> InboundRequest {
    InboundRequest::new(format!(
        r#"{{"requestId": "{correlation_id}", "patient": {{"id": "p@apollo"}}}}"#
    ))
    .with_header(PROVIDER_ID_HEADER, "hip-9")
}

fn on_discover_callback(correlation_id: &str) -> InboundRequest {
    InboundRequest::new(format!(
        r#"{{"resp": {{"requestId": "{correlation_id}"}}, "careContexts": [{{"referenceNumber": "cc-1"}}]}}"#
    ))
    .with_header(CM_ID_HEADER, "apollo")
}

#[tokio::test]
async fn request_forwarded_and_callback_relayed_exactly_once() {
    let gateway = gateway();
    gateway.store.add_cm("apollo", "https://apollo.example/cm");
    gateway
        .store
        .add_service("hip-9", ServiceRole::Provider, "https://hip-9.example");

    // The caller is acknowledged as soon as admission succeeds.
    gateway
        .requests
        .handle("apollo", &discover_request("corr-42"))
        .await
        .unwrap();

    eventually(|| !gateway.forward_dispatcher.requests().is_empty()).await;
    let forwarded = gateway.forward_dispatcher.requests().remove(0);
    assert_eq!(
        forwarded.url(),
        "https://hip-9.example/v0.5/care-contexts/discover"
    );
    assert!(forwarded
        .headers
        .contains(&(CM_ID_HEADER.to_string(), "apollo".to_string())));
    assert!(forwarded
        .headers
        .contains(&(GATEWAY_ID_HEADER.to_string(), "hdx-gateway".to_string())));

    // The provider answers; the gateway relays to the recorded origin.
    gateway
        .responses
        .handle(&on_discover_callback("corr-42"))
        .await
        .unwrap();

    let relayed = gateway.relay_dispatcher.requests();
    assert_eq!(relayed.len(), 1);
    assert_eq!(
        relayed[0].url(),
        "https://apollo.example/cm/v0.5/care-contexts/on-discover"
    );
    assert!(relayed[0].body.contains("cc-1"));

    // The correlation is consumed: a replayed callback is dropped.
    let err = gateway
        .responses
        .handle(&on_discover_callback("corr-42"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::UnknownCorrelation { .. }));
    assert_eq!(gateway.relay_dispatcher.requests().len(), 1);

    // And the id becomes reusable for a fresh exchange.
    gateway
        .requests
        .handle("apollo", &discover_request("corr-42"))
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_request_never_contacts_downstream_twice() {
    let gateway = gateway();
    gateway
        .store
        .add_service("hip-9", ServiceRole::Provider, "https://hip-9.example");

    let correlation_id = Uuid::new_v4().to_string();
    gateway
        .requests
        .handle("apollo", &discover_request(&correlation_id))
        .await
        .unwrap();
    let err = gateway
        .requests
        .handle("apollo", &discover_request(&correlation_id))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::DuplicateRequest { .. }));
    eventually(|| gateway.forward_dispatcher.requests().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(25)).await;
    assert_eq!(gateway.forward_dispatcher.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unanswered_correlation_expires_and_late_callback_is_unknown() {
    let gateway = gateway();
    gateway.store.add_cm("apollo", "https://apollo.example/cm");
    gateway
        .store
        .add_service("hip-9", ServiceRole::Provider, "https://hip-9.example");

    gateway
        .requests
        .handle("apollo", &discover_request("corr-42"))
        .await
        .unwrap();
    eventually(|| !gateway.forward_dispatcher.requests().is_empty()).await;

    // No callback arrives within the TTL.
    tokio::time::advance(CORRELATION_TTL + Duration::from_millis(1)).await;
    assert!(gateway.correlations.lookup("corr-42").await.is_none());

    let err = gateway
        .responses
        .handle(&on_discover_callback("corr-42"))
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::UnknownCorrelation { .. }));
    assert!(gateway.relay_dispatcher.requests().is_empty());
}

#[tokio::test]
async fn failed_relay_allows_a_later_attempt_until_expiry() {
    let gateway = gateway();
    gateway.store.add_cm("apollo", "https://apollo.example/cm");
    gateway
        .store
        .add_service("hip-9", ServiceRole::Provider, "https://hip-9.example");

    gateway
        .requests
        .handle("apollo", &discover_request("corr-42"))
        .await
        .unwrap();

    gateway
        .relay_dispatcher
        .fail
        .store(true, std::sync::atomic::Ordering::Relaxed);
    gateway
        .responses
        .handle(&on_discover_callback("corr-42"))
        .await
        .unwrap();
    assert!(gateway.correlations.lookup("corr-42").await.is_some());

    // The target recovers; the provider's retransmitted callback relays and
    // consumes the correlation.
    gateway
        .relay_dispatcher
        .fail
        .store(false, std::sync::atomic::Ordering::Relaxed);
    gateway
        .responses
        .handle(&on_discover_callback("corr-42"))
        .await
        .unwrap();
    assert!(gateway.correlations.lookup("corr-42").await.is_none());
    assert_eq!(gateway.relay_dispatcher.requests().len(), 2);
}
