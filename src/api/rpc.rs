use std::net::IpAddr;

use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use serde::{self, Deserialize, Serialize};

use crate::models::{RouteAdvertisement, RouteWithdrawal};

/// Inbound route updates and restart signals from the routing daemon.
/// Served only while this instance holds ownership.
#[rpc(client, server)]
pub trait UpdateApi {
    #[method(name = "push_route")]
    async fn push_route(&self, route: RouteAdvertisement) -> RpcResult<String>;
    #[method(name = "withdraw_route")]
    async fn withdraw_route(&self, route: RouteWithdrawal) -> RpcResult<String>;
    /// Daemon restarted and needs its configuration replayed
    #[method(name = "start_config_resync")]
    async fn start_config_resync(&self) -> RpcResult<bool>;
}

/// Read-only view of reconciliation state for operational tooling
#[rpc(client, server)]
pub trait InspectApi {
    #[method(name = "show_replays")]
    async fn show_replays(&self) -> RpcResult<Vec<ReplaySummary>>;
    #[method(name = "show_update_history")]
    async fn show_update_history(&self, limit: Option<usize>) -> RpcResult<Vec<UpdateEntry>>;
    #[method(name = "show_stale_routes")]
    async fn show_stale_routes(&self) -> RpcResult<Vec<StaleRoute>>;
    #[method(name = "show_replay_state")]
    async fn show_replay_state(&self) -> RpcResult<ReplayStatus>;
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReplaySummary {
    pub started: i64,
    pub ended: i64,
    pub duration: String,
    pub state: String,
    pub succeeded: bool,
    pub stale_count: usize,
    // None when the stale sweep never ran
    pub cleared_count: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateEntry {
    pub received_at: i64,
    pub age: String,
    pub action: String,
    pub protocol: String,
    pub rd: String,
    pub prefix: String,
    pub next_hop: Option<String>,
    pub label: u32,
    pub mac: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct StaleRoute {
    pub rd: String,
    pub prefix: String,
    pub next_hop: IpAddr,
    pub label: u32,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReplayStatus {
    pub owner: bool,
    pub connected: bool,
    // None before the first replay
    pub state: Option<String>,
    pub cleanup_pending: bool,
    pub stale_routes: usize,
    pub last_succeeded: Option<bool>,
}
