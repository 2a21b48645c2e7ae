//! rfl-ordering
//!
//! Firewall rule order reconciliation engine.
//!
//! Architectural decisions:
//! - The appliance owns the authoritative order; we only observe and correct it
//! - Every check starts from a fresh snapshot; nothing is cached
//! - Drift is a normal result, never an error
//! - Correction is one Move command that appends the desired run at the tail
//! - No retries, no locking: the validate/enforce window is an accepted race
//!
//! Transport is injected through the [`Appliance`] trait. This crate does no IO.

mod appliance;
mod engine;
mod error;
pub mod lifecycle;
mod types;

pub use appliance::Appliance;
pub use engine::{
    contains_run, enforce, fetch, is_satisfied, reconcile, resolve, resolve_all, resolve_in,
    ReconcileOutcome,
};
pub use error::{Operation, OrderingError, Result, TransportError};
pub use types::*;
