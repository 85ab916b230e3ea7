//! Reconciliation between the local forwarding database and the routing daemon.

mod ingest;
mod replay;
mod results;
mod retry;
mod scheduler;
mod stale;
#[cfg(test)]
pub(crate) mod testing;

pub use ingest::{IngestError, IngestOutcome, RouteIngestPipeline, UpdateAction, UpdateRecord};
pub use replay::{JobOutcome, ReplayOrchestrator, ReplayState};
pub use results::{ReplayResult, ReplayResults, REPLAY_STATUS_PATH};
pub use retry::RetryCounter;
pub use scheduler::ReconciliationScheduler;
pub use stale::{StaleEntry, StaleMatch, StaleRouteTable};

pub(crate) use ingest::EndpointIndex;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as SyncMutex};

use log::warn;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;

use crate::config::{BgpConfig, Settings};
use crate::daemon::{DaemonError, DaemonResult, RoutingDaemonClient};
use crate::fib::{FibWriter, OverlayMembership};
use crate::models::{RouteKey, RouteRecord};
use crate::utils::BoundedLog;

/// State shared by the replay worker and inbound update processing.
/// Never held across a daemon call.
#[derive(Debug, Default)]
pub(crate) struct SharedState {
    pub(crate) connected: bool,
    pub(crate) config: Arc<BgpConfig>,
    pub(crate) stale: StaleRouteTable,
    /// Routes written by the reconciler, by key
    pub(crate) routes: HashMap<RouteKey, RouteRecord>,
    pub(crate) endpoints: EndpointIndex,
}

/// Everything a reconciliation task needs, owned by one engine
pub(crate) struct Context {
    pub(crate) settings: Settings,
    state: Mutex<SharedState>,
    pub(crate) daemon: Arc<dyn RoutingDaemonClient>,
    pub(crate) fib: Arc<dyn FibWriter>,
    pub(crate) overlay: Arc<dyn OverlayMembership>,
    history: SyncMutex<BoundedLog<UpdateRecord>>,
}

impl Context {
    pub(crate) fn new(
        settings: Settings,
        config: BgpConfig,
        daemon: Arc<dyn RoutingDaemonClient>,
        fib: Arc<dyn FibWriter>,
        overlay: Arc<dyn OverlayMembership>,
    ) -> Self {
        let history = BoundedLog::new(settings.history_capacity);
        Self {
            settings,
            state: Mutex::new(SharedState {
                config: Arc::new(config),
                ..SharedState::default()
            }),
            daemon,
            fib,
            overlay,
            history: SyncMutex::new(history),
        }
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().await
    }

    pub(crate) async fn config(&self) -> Arc<BgpConfig> {
        self.state.lock().await.config.clone()
    }

    pub(crate) async fn is_connected(&self) -> bool {
        self.state.lock().await.connected
    }

    pub(crate) async fn set_connected(&self, connected: bool) {
        self.state.lock().await.connected = connected;
    }

    /// Bound a daemon call by the configured per-call timeout
    pub(crate) async fn call<T, F>(&self, call: F) -> DaemonResult<T>
    where
        F: Future<Output = DaemonResult<T>>,
    {
        match timeout(self.settings.rpc_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DaemonError::Timeout),
        }
    }

    pub(crate) fn record_update(&self, record: UpdateRecord) {
        match self.history.lock() {
            Ok(mut history) => history.push(record),
            Err(_) => warn!("Update history unavailable, dropping entry"),
        }
    }

    pub(crate) fn history(&self) -> Vec<UpdateRecord> {
        self.history
            .lock()
            .map(|history| history.to_vec())
            .unwrap_or_default()
    }
}
