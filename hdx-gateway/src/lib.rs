/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! # hdx-gateway
//!
//! `hdx-gateway` relays signed, asynchronous request/callback exchanges
//! between health-data actors: consent managers, and bridges fronting
//! provider, consumer, and health-locker services. Actors never talk to each
//! other directly; they call the gateway, which resolves the target through
//! its routing registry, forwards the request, and later re-correlates the
//! asynchronous callback back to the original caller.
//!
//! ## Internal architecture map
//!
//! - Registry: system of record for addressable actors, validated mutations,
//!   identity-provider client provisioning, and cache invalidation
//! - Routing: cache-aside target resolution and the pending-correlation
//!   namespace
//! - Relay: request admission/forwarding, callback correlation/relay, and the
//!   fire-and-forget dispatch pool
//! - Clients: trait seams and reqwest bindings for the identity-provider
//!   admin API and the facility directory
//!
//! ## Correlation model
//!
//! A request body carries its application-level correlation id (`requestId`);
//! the callback answering it references the same id as `resp.requestId`.
//! Pending state lives in a TTL-bounded cache namespace: at most one live
//! entry per id, consumed by the single callback that relays successfully, or
//! expired when no callback ever arrives.
//!
//! ## Observability model
//!
//! The workspace uses `tracing` for logs/events. Library code emits
//! events/spans and does not unconditionally initialize a global subscriber.
//! Binaries are responsible for one-time `tracing_subscriber` initialization
//! at process boundaries.

mod error;
pub use error::GatewayError;

pub mod clients;
#[doc(hidden)]
pub mod observability;
pub mod registry;
pub mod relay;
pub mod routing;

pub use registry::model;
pub use registry::{PgRegistryStore, RegistryService, RegistryStore};
pub use relay::{
    CallbackKind, DispatchPool, Dispatcher, ExchangeKind, HttpDispatcher, InboundRequest,
    RequestOrchestrator, ResponseOrchestrator,
};
pub use routing::{CorrelationMap, RoutingResolver};
