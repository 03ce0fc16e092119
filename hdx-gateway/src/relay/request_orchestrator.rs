//! Admission and forwarding of one inbound actor request.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::GatewayError;
use crate::observability::events;
use crate::relay::dispatch::{DispatchPool, DispatchRequest};
use crate::relay::exchange::{ExchangeKind, GATEWAY_ID_HEADER};
use crate::relay::validated::{extract_request_id, InboundRequest};
use crate::routing::{CorrelationMap, PendingCorrelation, RoutingResolver};

const COMPONENT: &str = "request_orchestrator";

/// Forwards one inbound request to its declared target and acknowledges the
/// caller without waiting for the eventual callback.
///
/// The caller identity is the authenticated client id supplied by the
/// identity collaborator, never a request header. Once admission succeeds the
/// dispatch outcome is logged only; it is never surfaced to the caller and
/// never retried.
pub struct RequestOrchestrator {
    exchange: ExchangeKind,
    gateway_id: String,
    routing: Arc<RoutingResolver>,
    correlations: Arc<CorrelationMap>,
    pool: DispatchPool,
}

impl RequestOrchestrator {
    pub fn new(
        exchange: ExchangeKind,
        gateway_id: impl Into<String>,
        routing: Arc<RoutingResolver>,
        correlations: Arc<CorrelationMap>,
        pool: DispatchPool,
    ) -> Self {
        Self {
            exchange,
            gateway_id: gateway_id.into(),
            routing,
            correlations,
            pool,
        }
    }

    /// Admits and forwards one request. An `Ok` return is the admission
    /// acknowledgment; the forward itself is fire-and-forget.
    pub async fn handle(
        &self,
        caller_id: &str,
        request: &InboundRequest,
    ) -> Result<(), GatewayError> {
        let Some(target_id) = request
            .header(self.exchange.target_header)
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            warn!(
                event = events::REQUEST_REJECTED,
                component = COMPONENT,
                exchange = self.exchange.name,
                origin_id = caller_id,
                reason = "missing_target_header",
                "request names no target actor"
            );
            return Err(GatewayError::InvalidRequest(format!(
                "missing {} header",
                self.exchange.target_header
            )));
        };

        let target = self
            .routing
            .resolve(&self.exchange.target_class.routing_key(target_id))
            .await?;

        let correlation_id = extract_request_id(&request.body)?;
        if let Err(err) = self
            .correlations
            .begin(
                &correlation_id,
                PendingCorrelation::new(caller_id, self.exchange.origin_class),
            )
            .await
        {
            warn!(
                event = events::REQUEST_REJECTED,
                component = COMPONENT,
                exchange = self.exchange.name,
                correlation_id = correlation_id.as_str(),
                origin_id = caller_id,
                reason = "duplicate_correlation_id",
                "correlation id is already pending"
            );
            return Err(err);
        }

        info!(
            event = events::REQUEST_ADMITTED,
            component = COMPONENT,
            exchange = self.exchange.name,
            correlation_id = correlation_id.as_str(),
            target_id,
            origin_id = caller_id,
            "request admitted; forwarding"
        );

        self.pool.submit(DispatchRequest {
            exchange: self.exchange.name,
            base_url: target.base_url,
            path: self.exchange.downstream_path.to_string(),
            headers: vec![
                (self.exchange.origin_header.to_string(), caller_id.to_string()),
                (GATEWAY_ID_HEADER.to_string(), self.gateway_id.clone()),
            ],
            body: request.body.clone(),
            correlation_id,
        });
        Ok(())
    }
}
