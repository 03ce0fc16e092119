//! Cache-aside routing resolution over the registry store.

use std::sync::Arc;
use std::time::Duration;

use routing_cache::TtlCache;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::observability::events;
use crate::registry::model::{RoutingEntry, RoutingKey, ServiceRole};
use crate::registry::store::RegistryStore;

const COMPONENT: &str = "routing_resolver";

/// Resolves "who is this target id, and what is its URL" with a TTL-bounded
/// cache in front of the registry store.
///
/// Only routable entries are ever cached, so an inactive or blocklisted
/// actor can never be served from the cache; a read miss always falls
/// through to the store and the result is cached before being returned.
pub struct RoutingResolver {
    store: Arc<dyn RegistryStore>,
    cache: TtlCache<RoutingKey, RoutingEntry>,
    ttl: Duration,
}

impl RoutingResolver {
    pub fn new(store: Arc<dyn RegistryStore>, ttl: Duration) -> Self {
        Self {
            store,
            cache: TtlCache::new(),
            ttl,
        }
    }

    /// Resolves routing info for one actor. Unknown, inactive, and
    /// blocklisted targets are all reported as unreachable.
    pub async fn resolve(&self, key: &RoutingKey) -> Result<RoutingEntry, GatewayError> {
        if let Some(entry) = self.cache.get(key).await {
            return Ok(entry);
        }

        debug!(
            event = events::ROUTING_RESOLVE_MISS,
            component = COMPONENT,
            key = %key,
            "routing cache miss; reading store"
        );

        let fetched = match key {
            RoutingKey::ConsentManager { suffix } => {
                self.store.resolve_consent_manager(suffix).await?
            }
            RoutingKey::BridgeService { service_id, role } => {
                self.store.resolve_bridge_service(service_id, *role).await?
            }
        };

        let Some(entry) = fetched.filter(RoutingEntry::is_routable) else {
            warn!(
                event = events::ROUTING_TARGET_UNREACHABLE,
                component = COMPONENT,
                key = %key,
                "target unknown, inactive, or blocklisted"
            );
            return Err(GatewayError::TargetUnreachable {
                target_id: key.to_string(),
            });
        };

        self.cache.put(key.clone(), entry.clone(), self.ttl).await;
        Ok(entry)
    }

    /// Drops one cached routing entry. Issued by the registry service after
    /// the corresponding store write has completed.
    pub async fn invalidate(&self, key: &RoutingKey) {
        self.cache.invalidate(key).await;
        debug!(
            event = events::ROUTING_CACHE_INVALIDATE,
            component = COMPONENT,
            key = %key,
            "routing cache entry invalidated"
        );
    }

    /// Convenience for invalidating one consent-manager entry.
    pub async fn invalidate_consent_manager(&self, suffix: &str) {
        self.invalidate(&RoutingKey::ConsentManager {
            suffix: suffix.to_string(),
        })
        .await;
    }

    /// Convenience for invalidating one bridge-service entry.
    pub async fn invalidate_bridge_service(&self, service_id: &str, role: ServiceRole) {
        self.invalidate(&RoutingKey::BridgeService {
            service_id: service_id.to_string(),
            role,
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::RoutingResolver;
    use crate::error::GatewayError;
    use crate::registry::model::{RoutingEntry, RoutingKey, ServiceRole};
    use crate::registry::testing::InMemoryRegistryStore;
    use std::sync::Arc;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    fn entry(id: &str, active: bool, blocklisted: bool) -> RoutingEntry {
        RoutingEntry {
            id: id.to_string(),
            base_url: format!("https://{id}.example"),
            active,
            blocklisted,
        }
    }

    fn cm_key(suffix: &str) -> RoutingKey {
        RoutingKey::ConsentManager {
            suffix: suffix.to_string(),
        }
    }

    #[tokio::test]
    async fn resolve_caches_after_first_store_read() {
        let store = Arc::new(InMemoryRegistryStore::new());
        store.put_cm_route("apollo", entry("apollo", true, false)).await;
        let resolver = RoutingResolver::new(store.clone(), TTL);

        let first = resolver.resolve(&cm_key("apollo")).await.unwrap();
        let second = resolver.resolve(&cm_key("apollo")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.cm_route_reads().await, 1);
    }

    #[tokio::test]
    async fn inactive_entry_is_unreachable_and_never_cached() {
        let store = Arc::new(InMemoryRegistryStore::new());
        store.put_cm_route("apollo", entry("apollo", false, false)).await;
        let resolver = RoutingResolver::new(store.clone(), TTL);

        for _ in 0..2 {
            let err = resolver.resolve(&cm_key("apollo")).await.unwrap_err();
            assert!(matches!(err, GatewayError::TargetUnreachable { .. }));
        }
        // Both attempts re-read the store: nothing unroutable was cached.
        assert_eq!(store.cm_route_reads().await, 2);
    }

    #[tokio::test]
    async fn blocklisted_entry_is_unreachable() {
        let store = Arc::new(InMemoryRegistryStore::new());
        store
            .put_service_route("hip-9", ServiceRole::Provider, entry("hip-9", true, true))
            .await;
        let resolver = RoutingResolver::new(store, TTL);

        let err = resolver
            .resolve(&RoutingKey::BridgeService {
                service_id: "hip-9".to_string(),
                role: ServiceRole::Provider,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::TargetUnreachable { .. }));
    }

    #[tokio::test]
    async fn invalidate_then_resolve_observes_latest_store_state() {
        let store = Arc::new(InMemoryRegistryStore::new());
        store.put_cm_route("apollo", entry("apollo", true, false)).await;
        let resolver = RoutingResolver::new(store.clone(), TTL);

        let before = resolver.resolve(&cm_key("apollo")).await.unwrap();
        assert_eq!(before.base_url, "https://apollo.example");

        let mut moved = entry("apollo", true, false);
        moved.base_url = "https://apollo-moved.example".to_string();
        store.put_cm_route("apollo", moved).await;
        resolver.invalidate_consent_manager("apollo").await;

        let after = resolver.resolve(&cm_key("apollo")).await.unwrap();
        assert_eq!(after.base_url, "https://apollo-moved.example");
    }

    #[tokio::test]
    async fn unknown_target_is_unreachable() {
        let store = Arc::new(InMemoryRegistryStore::new());
        let resolver = RoutingResolver::new(store, TTL);

        let err = resolver.resolve(&cm_key("nowhere")).await.unwrap_err();
        assert!(matches!(err, GatewayError::TargetUnreachable { .. }));
    }
}
