//! Control-plane reconciliation between a route-distribution layer and a BGP daemon.
//!
//! The [`ReconciliationEngine`] replays desired configuration into the daemon after
//! it restarts or after ownership is granted, feeds learned routes into the FIB, and
//! sweeps routes that were not refreshed within the stale-path window.
pub mod api;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod events;
pub mod fib;
pub mod models;
pub mod ownership;
pub mod reconcile;
mod utils;

pub use config::ServerConfig;
pub use engine::{Collaborators, ReconciliationEngine};
pub use events::{ConfigEvent, ConfigKind, ConfigValue};
pub use ownership::{Gated, OwnershipGate, OwnershipOracle};
