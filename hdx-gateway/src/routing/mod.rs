//! Routing layer.
//!
//! Owns target resolution (cache-aside over the registry store) and the
//! pending-correlation namespace that matches callbacks to the requests that
//! provoked them. Both namespaces share the TTL cache mechanism from the
//! `routing-cache` crate; neither is ever a source of truth for registry
//! state.

pub(crate) mod correlation;
pub(crate) mod resolver;

pub use correlation::{CorrelationMap, PendingCorrelation};
pub use resolver::RoutingResolver;
