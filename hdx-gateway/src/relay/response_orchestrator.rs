//! Correlation and relay of one inbound callback.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::observability::events;
use crate::relay::dispatch::{DispatchRequest, Dispatcher};
use crate::relay::exchange::{CallbackKind, GATEWAY_ID_HEADER};
use crate::relay::validated::{InboundRequest, ValidatedCallback};
use crate::routing::{CorrelationMap, RoutingResolver};

const COMPONENT: &str = "response_orchestrator";

/// Relays one callback to the actor whose request provoked it.
///
/// The origin is resolved from the recorded pending state, never from the
/// callback's own headers, which serve only as routing hints. The pending
/// entry is consumed only after a successful relay; a failed relay leaves it
/// to TTL expiry so a retry cannot race a duplicate relay.
pub struct ResponseOrchestrator {
    callback: CallbackKind,
    gateway_id: String,
    routing: Arc<RoutingResolver>,
    correlations: Arc<CorrelationMap>,
    dispatcher: Arc<dyn Dispatcher>,
}

impl ResponseOrchestrator {
    pub fn new(
        callback: CallbackKind,
        gateway_id: impl Into<String>,
        routing: Arc<RoutingResolver>,
        correlations: Arc<CorrelationMap>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            callback,
            gateway_id: gateway_id.into(),
            routing,
            correlations,
            dispatcher,
        }
    }

    /// Correlates and relays one callback. Errors mark callbacks that were
    /// dropped with nothing relayed; a relay failure after successful
    /// correlation is terminal at the gateway and reported as `Ok`.
    pub async fn handle(&self, request: &InboundRequest) -> Result<(), GatewayError> {
        let callback = match ValidatedCallback::parse(request, self.callback.origin_header) {
            Ok(callback) => callback,
            Err(err) => {
                warn!(
                    event = events::CALLBACK_MALFORMED,
                    component = COMPONENT,
                    exchange = self.callback.name,
                    err = %err,
                    "dropping callback with no extractable correlation id"
                );
                return Err(err);
            }
        };

        debug!(
            event = events::CALLBACK_RECEIVED,
            component = COMPONENT,
            exchange = self.callback.name,
            correlation_id = callback.correlation_id.as_str(),
            declared_origin = callback.declared_origin_id.as_deref().unwrap_or("none"),
            "callback received"
        );

        let Some(pending) = self.correlations.lookup(&callback.correlation_id).await else {
            warn!(
                event = events::CALLBACK_UNKNOWN_CORRELATION,
                component = COMPONENT,
                exchange = self.callback.name,
                correlation_id = callback.correlation_id.as_str(),
                "dropping callback: correlation never issued, already consumed, or expired"
            );
            return Err(GatewayError::UnknownCorrelation {
                correlation_id: callback.correlation_id,
            });
        };

        let origin = self
            .routing
            .resolve(&pending.origin_class.routing_key(&pending.origin_id))
            .await?;

        let relay = DispatchRequest {
            exchange: self.callback.name,
            base_url: origin.base_url,
            path: self.callback.callback_path.to_string(),
            headers: vec![(GATEWAY_ID_HEADER.to_string(), self.gateway_id.clone())],
            body: callback.payload,
            correlation_id: callback.correlation_id.clone(),
        };

        match self.dispatcher.dispatch(&relay).await {
            Ok(()) => {
                self.correlations.complete(&callback.correlation_id).await;
                info!(
                    event = events::CALLBACK_RELAY_OK,
                    component = COMPONENT,
                    exchange = self.callback.name,
                    correlation_id = callback.correlation_id.as_str(),
                    origin_id = pending.origin_id.as_str(),
                    "callback relayed; correlation consumed"
                );
            }
            Err(err) => {
                // Entry stays live until TTL expiry; no retry.
                warn!(
                    event = events::CALLBACK_RELAY_FAILED,
                    component = COMPONENT,
                    exchange = self.callback.name,
                    correlation_id = callback.correlation_id.as_str(),
                    origin_id = pending.origin_id.as_str(),
                    err = %err,
                    "callback relay failed; pending state left to expire"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ResponseOrchestrator;
    use crate::error::GatewayError;
    use crate::registry::model::{ActorClass, RoutingEntry};
    use crate::registry::testing::InMemoryRegistryStore;
    use crate::relay::dispatch::{DispatchError, DispatchRequest, Dispatcher};
    use crate::relay::exchange::{CallbackKind, CM_ID_HEADER};
    use crate::relay::validated::InboundRequest;
    use crate::routing::{CorrelationMap, PendingCorrelation, RoutingResolver};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct RecordingDispatcher {
        fail: AtomicBool,
        requests: Mutex<Vec<DispatchRequest>>,
    }

    impl RecordingDispatcher {
        fn requests(&self) -> Vec<DispatchRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn dispatch(&self, request: &DispatchRequest) -> Result<(), DispatchError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail.load(Ordering::Relaxed) {
                Err(DispatchError::Rejected { status: 503 })
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        store: Arc<InMemoryRegistryStore>,
        correlations: Arc<CorrelationMap>,
        dispatcher: Arc<RecordingDispatcher>,
        orchestrator: ResponseOrchestrator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryRegistryStore::new());
        let routing = Arc::new(RoutingResolver::new(store.clone(), TTL));
        let correlations = Arc::new(CorrelationMap::new(TTL));
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let orchestrator = ResponseOrchestrator::new(
            CallbackKind::on_discover(),
            "hdx-gateway",
            routing,
            correlations.clone(),
            dispatcher.clone(),
        );
        Fixture {
            store,
            correlations,
            dispatcher,
            orchestrator,
        }
    }

    async fn seed_origin(fixture: &Fixture) {
        fixture
            .store
            .put_cm_route(
                "apollo",
                RoutingEntry {
                    id: "apollo".to_string(),
                    base_url: "https://apollo.example/cm".to_string(),
                    active: true,
                    blocklisted: false,
                },
            )
            .await;
        fixture
            .correlations
            .begin(
                "corr-42",
                PendingCorrelation::new("apollo", ActorClass::ConsentManager),
            )
            .await
            .unwrap();
    }

    fn callback(correlation_id: &str) -> InboundRequest {
        InboundRequest::new(format!(
            r#"{{"resp": {{"requestId": "{correlation_id}"}}, "careContexts": []}}"#
        ))
        .with_header(CM_ID_HEADER, "apollo")
    }

    #[tokio::test]
    async fn callback_is_relayed_to_recorded_origin_and_consumed() {
        let fixture = fixture();
        seed_origin(&fixture).await;

        fixture.orchestrator.handle(&callback("corr-42")).await.unwrap();

        let relayed = fixture.dispatcher.requests();
        assert_eq!(relayed.len(), 1);
        assert_eq!(
            relayed[0].url(),
            "https://apollo.example/cm/v0.5/care-contexts/on-discover"
        );
        assert!(relayed[0].body.contains("careContexts"));
        assert!(fixture.correlations.lookup("corr-42").await.is_none());
    }

    #[tokio::test]
    async fn second_callback_for_consumed_correlation_is_dropped() {
        let fixture = fixture();
        seed_origin(&fixture).await;
        fixture.orchestrator.handle(&callback("corr-42")).await.unwrap();

        let err = fixture
            .orchestrator
            .handle(&callback("corr-42"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UnknownCorrelation { .. }));
        // At most one relay per issued correlation id.
        assert_eq!(fixture.dispatcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn callback_for_unknown_correlation_is_dropped_without_relay() {
        let fixture = fixture();

        let err = fixture
            .orchestrator
            .handle(&callback("corr-99"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UnknownCorrelation { .. }));
        assert!(fixture.dispatcher.requests().is_empty());
    }

    #[tokio::test]
    async fn malformed_callback_is_dropped_without_relay() {
        let fixture = fixture();
        seed_origin(&fixture).await;

        let err = fixture
            .orchestrator
            .handle(&InboundRequest::new(r#"{"careContexts": []}"#))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::MalformedCallback(_)));
        assert!(fixture.dispatcher.requests().is_empty());
        // The pending entry is untouched.
        assert!(fixture.correlations.lookup("corr-42").await.is_some());
    }

    #[tokio::test]
    async fn failed_relay_leaves_pending_state_for_ttl_expiry() {
        let fixture = fixture();
        seed_origin(&fixture).await;
        fixture.dispatcher.fail.store(true, Ordering::Relaxed);

        fixture.orchestrator.handle(&callback("corr-42")).await.unwrap();

        assert_eq!(fixture.dispatcher.requests().len(), 1);
        // Not consumed: the entry survives until TTL expiry instead of being
        // retried.
        assert!(fixture.correlations.lookup("corr-42").await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_correlation_is_unknown_even_with_pending_entry_history() {
        let fixture = fixture();
        seed_origin(&fixture).await;

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        let err = fixture
            .orchestrator
            .handle(&callback("corr-42"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UnknownCorrelation { .. }));
        assert!(fixture.dispatcher.requests().is_empty());
    }
}
