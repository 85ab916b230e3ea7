use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use jsonrpsee::core::{Error as RpcError, RpcResult};
use jsonrpsee::http_server::{HttpServerBuilder, HttpServerHandle};
use log::{info, warn};
use tokio::sync::Mutex;

use super::routes::{record_to_entry, stale_to_route};
use super::rpc::{
    InspectApiServer, ReplayStatus, ReplaySummary, StaleRoute, UpdateApiServer, UpdateEntry,
};
use crate::engine::ReconciliationEngine;
use crate::models::{RouteAdvertisement, RouteWithdrawal};
use crate::ownership::{Gated, InboundService, ServiceError};
use crate::reconcile::{IngestError, IngestOutcome};

fn not_owner() -> RpcError {
    RpcError::Custom("not the owning instance".to_string())
}

fn ingest_response(result: Gated<Result<IngestOutcome, IngestError>>) -> RpcResult<String> {
    match result {
        Gated::Executed(Ok(outcome)) => Ok(format!("{:?}", outcome)),
        Gated::Executed(Err(err)) => Err(RpcError::Custom(err.to_string())),
        Gated::NotOwner => Err(not_owner()),
    }
}

#[derive(Clone)]
pub struct UpdateRpc {
    engine: Arc<ReconciliationEngine>,
}

#[async_trait]
impl UpdateApiServer for UpdateRpc {
    async fn push_route(&self, route: RouteAdvertisement) -> RpcResult<String> {
        ingest_response(self.engine.on_advertise(&route).await)
    }

    async fn withdraw_route(&self, route: RouteWithdrawal) -> RpcResult<String> {
        ingest_response(self.engine.on_withdraw(&route).await)
    }

    async fn start_config_resync(&self) -> RpcResult<bool> {
        match self.engine.on_daemon_restart().await {
            Gated::Executed(()) => Ok(true),
            Gated::NotOwner => Err(not_owner()),
        }
    }
}

/// Serves `UpdateApi` while this instance owns the daemon session
pub struct UpdateService {
    engine: Arc<ReconciliationEngine>,
    socket: SocketAddr,
    handle: Mutex<Option<HttpServerHandle>>,
}

impl UpdateService {
    pub fn new(engine: Arc<ReconciliationEngine>, socket: SocketAddr) -> Self {
        Self {
            engine,
            socket,
            handle: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}

#[async_trait]
impl InboundService for UpdateService {
    async fn start(&self) -> Result<(), ServiceError> {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            return Ok(());
        }
        let error = |err: RpcError| ServiceError {
            service: "update API",
            reason: err.to_string(),
        };
        info!("Starting update JSON-RPC server on {}...", self.socket);
        let server = HttpServerBuilder::default()
            .build(self.socket)
            .await
            .map_err(error)?;
        let rpc = UpdateRpc {
            engine: self.engine.clone(),
        };
        *handle = Some(server.start(rpc.into_rpc()).map_err(error)?);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            info!("Stopping update JSON-RPC server on {}", self.socket);
            match handle.stop() {
                Ok(stopped) => {
                    let _ = stopped.await;
                }
                Err(err) => warn!("Update server already stopped: {}", err),
            }
        }
    }
}

#[derive(Clone)]
pub struct InspectRpc {
    engine: Arc<ReconciliationEngine>,
}

#[async_trait]
impl InspectApiServer for InspectRpc {
    async fn show_replays(&self) -> RpcResult<Vec<ReplaySummary>> {
        let results = self.engine.replay_results();
        Ok(results.iter().map(ReplaySummary::from).collect())
    }

    async fn show_update_history(&self, limit: Option<usize>) -> RpcResult<Vec<UpdateEntry>> {
        let history = self.engine.update_history();
        let skip = limit.map(|l| history.len().saturating_sub(l)).unwrap_or(0);
        Ok(history
            .into_iter()
            .skip(skip)
            .map(record_to_entry)
            .collect())
    }

    async fn show_stale_routes(&self) -> RpcResult<Vec<StaleRoute>> {
        let entries = self.engine.stale_routes().await;
        Ok(entries.into_iter().map(stale_to_route).collect())
    }

    async fn show_replay_state(&self) -> RpcResult<ReplayStatus> {
        Ok(ReplayStatus {
            owner: self.engine.is_owner(),
            connected: self.engine.is_connected().await,
            state: self.engine.replay_state().map(|s| s.to_string()),
            cleanup_pending: self.engine.cleanup_pending(),
            stale_routes: self.engine.stale_routes().await.len(),
            last_succeeded: self.engine.last_replay().map(|r| r.succeeded),
        })
    }
}

/// Start the always-on inspection server
pub async fn serve_inspect_api(
    engine: Arc<ReconciliationEngine>,
    socket: SocketAddr,
) -> Result<HttpServerHandle, RpcError> {
    info!("Starting inspection JSON-RPC server on {}...", socket);
    let server = HttpServerBuilder::default().build(socket).await?;
    server.start(InspectRpc { engine }.into_rpc())
}
