//! Service Layer
//!
//! Business logic that sits between the route handlers and the store.
//! Services own the multi-record updates (agent locks, stale lock recovery)
//! so handlers and the orchestrator stay thin.

mod lock_service;

pub use lock_service::*;
