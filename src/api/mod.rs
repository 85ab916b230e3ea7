mod handler;
mod replays;
mod routes;
pub mod rpc;

pub use handler::{serve_inspect_api, InspectRpc, UpdateRpc, UpdateService};
pub use rpc::{InspectApiClient, ReplayStatus, ReplaySummary, StaleRoute, UpdateApiClient, UpdateEntry};
