//! Relay layer.
//!
//! Owns the asynchronous request/callback exchange: admission and forwarding
//! of actor requests, correlation and relay of the callbacks that answer
//! them, and the fire-and-forget dispatch pool both sides send through.
//! Orchestrators are stateless beyond the shared cache and store, so any
//! number of them may run concurrently without coordination.

pub mod dispatch;
pub(crate) mod exchange;
pub(crate) mod request_orchestrator;
pub(crate) mod response_orchestrator;
pub(crate) mod validated;

pub use dispatch::{DispatchError, DispatchPool, DispatchRequest, Dispatcher, HttpDispatcher};
pub use exchange::{
    CallbackKind, ExchangeKind, CM_ID_HEADER, CONSUMER_ID_HEADER, GATEWAY_ID_HEADER,
    PATH_CARE_CONTEXTS_DISCOVER, PATH_CARE_CONTEXTS_ON_DISCOVER, PATH_LINK_INIT,
    PATH_LINK_ON_INIT, PROVIDER_ID_HEADER,
};
pub use request_orchestrator::RequestOrchestrator;
pub use response_orchestrator::ResponseOrchestrator;
pub use validated::{InboundRequest, ValidatedCallback};
