//! Structured-logging vocabulary shared across the crate.
//!
//! Library code emits `tracing` events/spans and does not unconditionally
//! initialize a global subscriber. Binaries are responsible for one-time
//! `tracing_subscriber` initialization at process boundaries.

pub mod events;
pub mod fields;
