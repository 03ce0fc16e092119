//! Pending-correlation state: one live entry per in-flight correlation id.

use std::time::Duration;

use routing_cache::TtlCache;
use tokio::time::Instant;

use crate::error::GatewayError;
use crate::registry::model::ActorClass;

/// Ephemeral state recorded when a request is forwarded and consumed when its
/// callback arrives. TTL expiry is the sole recovery path for callbacks that
/// never arrive.
#[derive(Clone, Debug)]
pub struct PendingCorrelation {
    /// The authenticated actor that made the original request.
    pub origin_id: String,
    /// Which registry namespace (and header namespace) identifies the origin.
    pub origin_class: ActorClass,
    pub created_at: Instant,
}

impl PendingCorrelation {
    pub fn new(origin_id: impl Into<String>, origin_class: ActorClass) -> Self {
        Self {
            origin_id: origin_id.into(),
            origin_class,
            created_at: Instant::now(),
        }
    }
}

/// Owner of the pending-correlation cache namespace.
///
/// Entries are written only by the request orchestrator and deleted only by
/// the response-orchestrator invocation that consumes them or by TTL expiry.
pub struct CorrelationMap {
    pending: TtlCache<String, PendingCorrelation>,
    ttl: Duration,
}

impl CorrelationMap {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: TtlCache::new(),
            ttl,
        }
    }

    /// Records pending state for `correlation_id`. A live entry under the
    /// same id means the caller retransmitted an in-flight request; the
    /// insert is rejected atomically, never overwritten.
    pub async fn begin(
        &self,
        correlation_id: &str,
        pending: PendingCorrelation,
    ) -> Result<(), GatewayError> {
        if self
            .pending
            .put_if_absent(correlation_id.to_string(), pending, self.ttl)
            .await
        {
            Ok(())
        } else {
            Err(GatewayError::DuplicateRequest {
                correlation_id: correlation_id.to_string(),
            })
        }
    }

    /// Looks up live pending state without consuming it.
    pub async fn lookup(&self, correlation_id: &str) -> Option<PendingCorrelation> {
        self.pending.get(&correlation_id.to_string()).await
    }

    /// Consumes the pending state after a successful relay.
    pub async fn complete(&self, correlation_id: &str) -> Option<PendingCorrelation> {
        self.pending.invalidate(&correlation_id.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::{CorrelationMap, PendingCorrelation};
    use crate::error::GatewayError;
    use crate::registry::model::ActorClass;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(120);

    fn pending(origin: &str) -> PendingCorrelation {
        PendingCorrelation::new(origin, ActorClass::ConsentManager)
    }

    #[tokio::test]
    async fn begin_rejects_live_duplicate() {
        let correlations = CorrelationMap::new(TTL);

        correlations.begin("corr-42", pending("apollo")).await.unwrap();
        let err = correlations
            .begin("corr-42", pending("mirror"))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::DuplicateRequest { .. }));
        // The original origin survives the rejected retransmission.
        let kept = correlations.lookup("corr-42").await.unwrap();
        assert_eq!(kept.origin_id, "apollo");
    }

    #[tokio::test]
    async fn complete_consumes_exactly_once() {
        let correlations = CorrelationMap::new(TTL);
        correlations.begin("corr-42", pending("apollo")).await.unwrap();

        assert!(correlations.complete("corr-42").await.is_some());
        assert!(correlations.complete("corr-42").await.is_none());
        assert!(correlations.lookup("corr-42").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_unreachable_and_id_becomes_reusable() {
        let correlations = CorrelationMap::new(TTL);
        correlations.begin("corr-42", pending("apollo")).await.unwrap();

        tokio::time::advance(TTL + Duration::from_millis(1)).await;

        assert!(correlations.lookup("corr-42").await.is_none());
        // A fresh request may reuse the id once the old entry expired.
        correlations.begin("corr-42", pending("mirror")).await.unwrap();
    }
}
