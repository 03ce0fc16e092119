//! Canonical structured event names used across `hdx-gateway`.

// Request-path admission and dispatch events.
pub const REQUEST_ADMITTED: &str = "request_admitted";
pub const REQUEST_REJECTED: &str = "request_rejected";
pub const DISPATCH_ATTEMPT: &str = "dispatch_attempt";
pub const DISPATCH_OK: &str = "dispatch_ok";
pub const DISPATCH_FAILED: &str = "dispatch_failed";
pub const DISPATCH_QUEUE_FULL: &str = "dispatch_queue_full";
pub const DISPATCH_QUEUE_CLOSED: &str = "dispatch_queue_closed";

// Callback-path correlation and relay events.
pub const CALLBACK_RECEIVED: &str = "callback_received";
pub const CALLBACK_MALFORMED: &str = "callback_malformed";
pub const CALLBACK_UNKNOWN_CORRELATION: &str = "callback_unknown_correlation";
pub const CALLBACK_RELAY_OK: &str = "callback_relay_ok";
pub const CALLBACK_RELAY_FAILED: &str = "callback_relay_failed";

// Routing and cache events.
pub const ROUTING_RESOLVE_MISS: &str = "routing_resolve_miss";
pub const ROUTING_TARGET_UNREACHABLE: &str = "routing_target_unreachable";
pub const ROUTING_CACHE_INVALIDATE: &str = "routing_cache_invalidate";

// Registry mutation lifecycle events.
pub const CM_REGISTERED: &str = "cm_registered";
pub const CM_UPDATED: &str = "cm_updated";
pub const BRIDGE_REGISTERED: &str = "bridge_registered";
pub const BRIDGE_UPDATED: &str = "bridge_updated";
pub const BRIDGE_SERVICE_UPSERTED: &str = "bridge_service_upserted";
pub const SERVICE_ROLE_CONFLICT: &str = "service_role_conflict";

// Identity-provider provisioning events.
pub const CLIENT_PROVISIONED: &str = "client_provisioned";
pub const CLIENT_DEPROVISIONED: &str = "client_deprovisioned";
pub const REALM_ROLE_MISSING: &str = "realm_role_missing";
