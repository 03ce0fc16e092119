//! Per-exchange wire configuration.
//!
//! Each exchange kind is one orchestrator configuration (headers, actor
//! classes, downstream path) rather than a type parameter, so all exchanges
//! share the same orchestrator code and differ only in the capability values
//! injected here.

use crate::registry::model::{ActorClass, ServiceRole};

pub const CM_ID_HEADER: &str = "X-CM-ID";
pub const PROVIDER_ID_HEADER: &str = "X-PROVIDER-ID";
pub const CONSUMER_ID_HEADER: &str = "X-CONSUMER-ID";
/// Marks the gateway as the forwarding intermediary on rewritten requests.
pub const GATEWAY_ID_HEADER: &str = "X-GATEWAY-ID";

pub const PATH_CARE_CONTEXTS_DISCOVER: &str = "/v0.5/care-contexts/discover";
pub const PATH_CARE_CONTEXTS_ON_DISCOVER: &str = "/v0.5/care-contexts/on-discover";
pub const PATH_LINK_INIT: &str = "/v0.5/links/link/init";
pub const PATH_LINK_ON_INIT: &str = "/v0.5/links/link/on-init";

/// Configuration for one forwarded request exchange.
#[derive(Clone, Debug)]
pub struct ExchangeKind {
    pub name: &'static str,
    /// Header naming the target actor of the forward.
    pub target_header: &'static str,
    pub target_class: ActorClass,
    /// Header namespace that identifies the origin actor, rewritten onto the
    /// forwarded request so the target can address its callback.
    pub origin_header: &'static str,
    pub origin_class: ActorClass,
    /// Fixed path appended to the target's base URL.
    pub downstream_path: &'static str,
}

/// Configuration for one relayed callback exchange.
#[derive(Clone, Debug)]
pub struct CallbackKind {
    pub name: &'static str,
    /// Header naming the actor the callback declares as its destination.
    /// Used as a routing hint only, never trusted over recorded state.
    pub origin_header: &'static str,
    /// Fixed path appended to the origin's base URL for the relay.
    pub callback_path: &'static str,
}

impl ExchangeKind {
    /// Consent manager asks a provider to discover care contexts.
    pub fn care_contexts_discover() -> Self {
        Self {
            name: "care-contexts-discover",
            target_header: PROVIDER_ID_HEADER,
            target_class: ActorClass::Service(ServiceRole::Provider),
            origin_header: CM_ID_HEADER,
            origin_class: ActorClass::ConsentManager,
            downstream_path: PATH_CARE_CONTEXTS_DISCOVER,
        }
    }

    /// Consent manager asks a provider to initialize a care-context link.
    pub fn link_init() -> Self {
        Self {
            name: "link-init",
            target_header: PROVIDER_ID_HEADER,
            target_class: ActorClass::Service(ServiceRole::Provider),
            origin_header: CM_ID_HEADER,
            origin_class: ActorClass::ConsentManager,
            downstream_path: PATH_LINK_INIT,
        }
    }
}

impl CallbackKind {
    pub fn on_discover() -> Self {
        Self {
            name: "care-contexts-on-discover",
            origin_header: CM_ID_HEADER,
            callback_path: PATH_CARE_CONTEXTS_ON_DISCOVER,
        }
    }

    pub fn on_link_init() -> Self {
        Self {
            name: "link-on-init",
            origin_header: CM_ID_HEADER,
            callback_path: PATH_LINK_ON_INIT,
        }
    }
}
