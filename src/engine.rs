use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, trace, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{BgpConfig, ConfigError, ConfigTreeWriter, Settings, WriteBehindQueue};
use crate::daemon::RoutingDaemonClient;
use crate::events::{handler_table, ConfigEvent, ConfigHandler, ConfigKind};
use crate::fib::{FibWriter, OverlayMembership};
use crate::models::{RouteAdvertisement, RouteWithdrawal};
use crate::ownership::{Gated, InboundService, OwnershipGate, OwnershipOracle};
use crate::reconcile::{
    Context, IngestError, IngestOutcome, ReconciliationScheduler, ReplayResult, ReplayState,
    RouteIngestPipeline, StaleEntry, UpdateRecord, REPLAY_STATUS_PATH,
};

/// External systems the engine drives
pub struct Collaborators {
    pub daemon: Arc<dyn RoutingDaemonClient>,
    pub fib: Arc<dyn FibWriter>,
    pub overlay: Arc<dyn OverlayMembership>,
    pub ownership: Arc<dyn OwnershipOracle>,
    pub config_writer: Option<Arc<dyn ConfigTreeWriter>>,
}

/// Owns all reconciliation state for one controller instance.
///
/// Configuration events, the daemon-restart signal and inbound route
/// updates all pass through the ownership gate; on standby instances
/// they are no-ops.
pub struct ReconciliationEngine {
    ctx: Arc<Context>,
    gate: OwnershipGate,
    ingest: RouteIngestPipeline,
    scheduler: ReconciliationScheduler,
    handlers: HashMap<ConfigKind, ConfigHandler>,
    publisher: Option<WriteBehindQueue>,
}

impl ReconciliationEngine {
    /// Must be called from within a tokio runtime
    pub fn new(settings: Settings, config: BgpConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            daemon,
            fib,
            overlay,
            ownership,
            config_writer,
        } = collaborators;
        let ctx = Arc::new(Context::new(settings, config, daemon, fib, overlay));
        let ingest = RouteIngestPipeline::new(ctx.clone());
        let publisher = config_writer.map(WriteBehindQueue::spawn);
        let scheduler =
            ReconciliationScheduler::spawn(ctx.clone(), ingest.clone(), publisher.clone());
        Self {
            ctx,
            gate: OwnershipGate::new(ownership),
            ingest,
            scheduler,
            handlers: handler_table(),
            publisher,
        }
    }

    /// Apply a configuration-tree change to the snapshot and, when connected,
    /// mirror it onto the daemon. Command failures are logged; the next
    /// replay converges the daemon.
    pub async fn handle(&self, event: ConfigEvent) -> Gated<Result<(), ConfigError>> {
        let what = format!("{:?} event at {}", event.kind, event.path);
        self.gate
            .guarded(&what, async {
                let handler = self
                    .handlers
                    .get(&event.kind)
                    .ok_or_else(|| ConfigError::Invalid(format!("no handler for {:?}", event.kind)))?;
                let (commands, connected) = {
                    let mut state = self.ctx.lock().await;
                    let config = Arc::make_mut(&mut state.config);
                    (handler(config, &event)?, state.connected)
                };
                trace!("{} produced {} commands", what, commands.len());
                if !connected {
                    if !commands.is_empty() {
                        debug!("Routing daemon not connected, deferring {}", what);
                    }
                    return Ok(());
                }
                let daemon = self.ctx.daemon.as_ref();
                for command in commands {
                    if let Err(err) = self.ctx.call(command.execute(daemon)).await {
                        warn!("{} failed: {}", command, err);
                    }
                }
                Ok::<(), ConfigError>(())
            })
            .await
    }

    /// The routing daemon restarted and lost its configuration
    pub async fn on_daemon_restart(&self) -> Gated<()> {
        self.gate
            .guarded("daemon restart", async {
                info!("Routing daemon restarted, replaying configuration");
                self.scheduler.trigger_replay();
            })
            .await
    }

    pub async fn on_advertise(
        &self,
        route: &RouteAdvertisement,
    ) -> Gated<Result<IngestOutcome, IngestError>> {
        self.gate
            .guarded("route advertisement", self.ingest.on_advertise(route))
            .await
    }

    pub async fn on_withdraw(
        &self,
        route: &RouteWithdrawal,
    ) -> Gated<Result<IngestOutcome, IngestError>> {
        self.gate
            .guarded("route withdrawal", self.ingest.on_withdraw(route))
            .await
    }

    pub async fn on_ownership_change(&self, owner: bool, inbound: Option<&dyn InboundService>) {
        if owner {
            info!("Ownership granted");
            if let Some(inbound) = inbound {
                if let Err(err) = inbound.start().await {
                    warn!("Unable to start inbound service: {}", err);
                }
            }
            self.scheduler.trigger_replay();
        } else {
            info!("Ownership lost");
            if let Some(inbound) = inbound {
                inbound.stop().await;
            }
            self.scheduler.cancel_all().await;
            if self.ctx.is_connected().await {
                self.ctx.daemon.disconnect().await;
                self.ctx.set_connected(false).await;
            }
            if let Some(publisher) = &self.publisher {
                publisher.delete(REPLAY_STATUS_PATH);
            }
        }
    }

    /// Follow the ownership oracle, reacting to the current value first
    pub fn watch_ownership(
        self: Arc<Self>,
        inbound: Option<Arc<dyn InboundService>>,
    ) -> JoinHandle<()> {
        let mut rx = self.gate.subscribe();
        tokio::spawn(async move {
            let initial = *rx.borrow();
            if initial {
                self.on_ownership_change(true, inbound.as_deref()).await;
            }
            while rx.changed().await.is_ok() {
                let owner = *rx.borrow();
                self.on_ownership_change(owner, inbound.as_deref()).await;
            }
            debug!("Ownership oracle closed");
        })
    }

    pub fn is_owner(&self) -> bool {
        self.gate.is_owner()
    }

    pub async fn is_connected(&self) -> bool {
        self.ctx.is_connected().await
    }

    pub async fn config(&self) -> Arc<BgpConfig> {
        self.ctx.config().await
    }

    pub fn replay_state(&self) -> Option<ReplayState> {
        self.scheduler.state()
    }

    pub fn subscribe_replay_state(&self) -> watch::Receiver<Option<ReplayState>> {
        self.scheduler.subscribe()
    }

    pub fn cleanup_pending(&self) -> bool {
        self.scheduler.cleanup_pending()
    }

    pub fn replay_results(&self) -> Vec<ReplayResult> {
        self.scheduler.results().all()
    }

    pub fn last_replay(&self) -> Option<ReplayResult> {
        self.scheduler.results().last()
    }

    pub fn update_history(&self) -> Vec<UpdateRecord> {
        self.ctx.history()
    }

    pub async fn stale_routes(&self) -> Vec<StaleEntry> {
        self.ctx.lock().await.stale.entries()
    }

    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
        if self.ctx.is_connected().await {
            self.ctx.daemon.disconnect().await;
            self.ctx.set_connected(false).await;
        }
    }
}
