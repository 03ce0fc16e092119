//! Clients for external collaborators.
//!
//! Each collaborator is reached through an object-safe trait so registry and
//! relay logic never name a concrete HTTP client; the reqwest-backed
//! implementations here are the production bindings.

pub mod facility;
pub mod identity_admin;
