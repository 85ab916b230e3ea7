use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::retry::{with_retry, RetryOutcome};
use super::{Context, RouteIngestPipeline, StaleRouteTable};
use crate::config::{BgpConfig, PeerConfig};
use crate::daemon::{DaemonResult, SessionParams};
use crate::models::AddressFamily;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayState {
    Connecting,
    PushingConfig,
    RouteSync,
    AwaitingStaleTimeout,
    Done,
    Cancelled,
}

impl ReplayState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ReplayState::Done | ReplayState::Cancelled)
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            ReplayState::Connecting => "Connecting",
            ReplayState::PushingConfig => "PushingConfig",
            ReplayState::RouteSync => "RouteSync",
            ReplayState::AwaitingStaleTimeout => "AwaitingStaleTimeout",
            ReplayState::Done => "Done",
            ReplayState::Cancelled => "Cancelled",
        };
        write!(f, "{}", display)
    }
}

/// How one replay job ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub started: DateTime<Utc>,
    pub state: ReplayState,
    pub succeeded: bool,
    /// Entries in the stale snapshot when the job started
    pub stale_count: usize,
    /// Delay before sweeping unconfirmed routes, if a sweep should run
    pub cleanup_after: Option<Duration>,
}

// Cancellation observed at a step boundary
struct Cancelled;

type Step<T> = Result<T, Cancelled>;

struct PushReport {
    succeeded: bool,
    forced_sync: bool,
}

/// Replays the full configuration snapshot into the routing daemon
pub struct ReplayOrchestrator {
    ctx: Arc<Context>,
    ingest: RouteIngestPipeline,
    state: Arc<watch::Sender<Option<ReplayState>>>,
}

impl ReplayOrchestrator {
    pub(crate) fn new(
        ctx: Arc<Context>,
        ingest: RouteIngestPipeline,
        state: Arc<watch::Sender<Option<ReplayState>>>,
    ) -> Self {
        Self { ctx, ingest, state }
    }

    fn enter(&self, state: ReplayState) {
        debug!("Replay entering {}", state);
        let _ = self.state.send(Some(state));
    }

    pub async fn run(&self, token: &CancellationToken) -> JobOutcome {
        let started = Utc::now();
        let mut outcome = JobOutcome {
            started,
            state: ReplayState::Done,
            succeeded: false,
            stale_count: 0,
            cleanup_after: None,
        };
        match self.replay(token, &mut outcome).await {
            Ok(()) => {
                self.enter(ReplayState::Done);
                info!(
                    "Replay done (succeeded={}, stale={})",
                    outcome.succeeded, outcome.stale_count
                );
            }
            Err(Cancelled) => {
                // A partial baseline must never drive a sweep
                self.ctx.lock().await.stale.clear();
                self.enter(ReplayState::Cancelled);
                info!("Replay cancelled");
                outcome.state = ReplayState::Cancelled;
                outcome.succeeded = false;
                outcome.cleanup_after = None;
            }
        }
        outcome
    }

    async fn replay(&self, token: &CancellationToken, outcome: &mut JobOutcome) -> Step<()> {
        let routes = match self.ctx.fib.routes() {
            Ok(routes) => routes,
            Err(err) => {
                warn!("Unable to snapshot forwarding database: {}", err);
                self.ctx.lock().await.stale.clear();
                return Ok(());
            }
        };
        let snapshot = StaleRouteTable::from_routes(&routes);
        outcome.stale_count = snapshot.len();
        self.ctx.lock().await.stale = snapshot;
        check(token)?;

        self.enter(ReplayState::Connecting);
        let settings = &self.ctx.settings;
        let connected = timeout(
            settings.rpc_timeout,
            self.ctx
                .daemon
                .connect(&settings.daemon_host, settings.daemon_port),
        )
        .await
        .unwrap_or(false);
        self.ctx.set_connected(connected).await;
        if !connected {
            warn!(
                "Unable to connect to routing daemon at {}:{}",
                settings.daemon_host, settings.daemon_port
            );
            self.ctx.lock().await.stale.clear();
            return Ok(());
        }
        check(token)?;

        self.enter(ReplayState::PushingConfig);
        let config = self.ctx.config().await;
        let push = self.push_config(&config, token).await?;
        check(token)?;

        self.enter(ReplayState::RouteSync);
        let mut succeeded = push.succeeded;
        let eor = self
            .attempt("send end-of-rib", token, || self.ctx.daemon.send_end_of_rib())
            .await?;
        succeeded &= eor.is_some();
        if push.forced_sync {
            info!("Routing daemon was already active, pulling its routes");
            for family in AddressFamily::RESYNC.iter() {
                succeeded &= self.drain(*family, token).await?;
            }
        }
        check(token)?;

        self.enter(ReplayState::AwaitingStaleTimeout);
        let delay = config.stalepath_secs(settings.default_stalepath_secs);
        debug!("Stale routes expire in {}s", delay);
        outcome.succeeded = succeeded;
        outcome.cleanup_after = Some(Duration::from_secs(delay));
        Ok(())
    }

    /// One daemon call under its own retry budget.
    /// `None` when the budget ran out.
    async fn attempt<T, F, Fut>(
        &self,
        what: &str,
        token: &CancellationToken,
        mut op: F,
    ) -> Step<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DaemonResult<T>>,
    {
        let ctx = &self.ctx;
        let attempts = ctx.settings.retry_attempts;
        match with_retry(what, attempts, token, || ctx.call(op())).await {
            RetryOutcome::Succeeded(value) => Ok(Some(value)),
            RetryOutcome::Exhausted(_) => Ok(None),
            RetryOutcome::Cancelled => Err(Cancelled),
        }
    }

    async fn push_config(&self, config: &BgpConfig, token: &CancellationToken) -> Step<PushReport> {
        let daemon = &self.ctx.daemon;
        let mut report = PushReport {
            succeeded: true,
            forced_sync: false,
        };

        match &config.as_config {
            Some(as_config) => {
                let params = &SessionParams::from(as_config);
                let started = self
                    .attempt("start session", token, || async move {
                        match daemon.start_session(params).await {
                            Ok(()) => Ok(false),
                            Err(err) if err.is_already_active() => Ok(true),
                            Err(err) => Err(err),
                        }
                    })
                    .await?;
                match started {
                    Some(forced_sync) => report.forced_sync = forced_sync,
                    None => report.succeeded = false,
                }
            }
            None => debug!("No AS configured, not starting a session"),
        }

        if let Some(gr) = &config.graceful_restart {
            let done = self
                .attempt("graceful restart", token, || {
                    daemon.add_graceful_restart(gr.stalepath_time)
                })
                .await?;
            report.succeeded &= done.is_some();
        }

        if let Some(bfd) = config.bfd.as_ref().filter(|bfd| bfd.enabled) {
            let done = self.attempt("BFD", token, || daemon.add_bfd(bfd)).await?;
            report.succeeded &= done.is_some();
        }

        for peer in config.peers.values() {
            report.succeeded &= self.push_neighbor(peer, token).await?;
        }

        if let Some(logging) = &config.logging {
            let done = self
                .attempt("logging", token, || daemon.set_logging(logging))
                .await?;
            report.succeeded &= done.is_some();
        }

        for vrf in config.vrfs.values() {
            for family in vrf.families.iter().copied() {
                let what = format!("VRF {} {}", vrf.rd, family);
                let done = self
                    .attempt(&what, token, || daemon.add_vrf(vrf, family))
                    .await?;
                report.succeeded &= done.is_some();
            }
        }

        for network in config.networks.values() {
            let what = format!("network [{}] {}", network.rd, network.prefix);
            let done = self
                .attempt(&what, token, || daemon.add_prefix(network))
                .await?;
            report.succeeded &= done.is_some();
        }

        for (family, enabled) in config.multipath.iter() {
            let family = *family;
            let what = format!("multipath {}", family);
            let done = if *enabled {
                self.attempt(&what, token, || daemon.enable_multipath(family))
                    .await?
            } else {
                self.attempt(&what, token, || daemon.disable_multipath(family))
                    .await?
            };
            report.succeeded &= done.is_some();
        }

        for vrf in config.vrfs.values() {
            if let Some(max_paths) = vrf.max_paths {
                let what = format!("max-paths {}", vrf.rd);
                let done = self
                    .attempt(&what, token, || daemon.set_max_paths(&vrf.rd, max_paths))
                    .await?;
                report.succeeded &= done.is_some();
            }
        }

        Ok(report)
    }

    /// Neighbor sub-steps each get their own budget. Steps after a failed
    /// add-neighbor are skipped; nothing already applied is rolled back.
    async fn push_neighbor(
        &self,
        peer: &PeerConfig,
        token: &CancellationToken,
    ) -> Step<bool> {
        let daemon = &self.ctx.daemon;
        let address = peer.address;
        let what = format!("neighbor {}", address);
        let added = self
            .attempt(&what, token, || async move {
                match daemon.add_neighbor(address, peer.remote_as).await {
                    Err(err) if err.is_peer_exists() => Ok(()),
                    other => other,
                }
            })
            .await?;
        if added.is_none() {
            return Ok(false);
        }

        let mut succeeded = true;
        if let Some(source) = peer.update_source {
            let what = format!("update-source {}", address);
            let done = self
                .attempt(&what, token, || daemon.add_update_source(address, source))
                .await?;
            succeeded &= done.is_some();
        }
        if let Some(ttl) = peer.multihop {
            let what = format!("multihop {}", address);
            let done = self
                .attempt(&what, token, || daemon.add_multihop(address, ttl))
                .await?;
            succeeded &= done.is_some();
        }
        for family in peer.families.iter().copied() {
            let what = format!("neighbor {} {}", address, family);
            let done = self
                .attempt(&what, token, || daemon.add_address_family(address, family))
                .await?;
            succeeded &= done.is_some();
        }
        Ok(succeeded)
    }

    /// Pull every route the daemon holds for `family` through the ingest
    /// pipeline. A daemon failure ends this family only.
    async fn drain(&self, family: AddressFamily, token: &CancellationToken) -> Step<bool> {
        let daemon = &self.ctx.daemon;
        if let Err(err) = self.ctx.call(daemon.open_route_sync(family)).await {
            warn!("Unable to open {} route sync: {}", family, err);
            return Ok(false);
        }
        let mut count = 0;
        let mut dropped = 0;
        let drained = loop {
            if token.is_cancelled() {
                break Err(Cancelled);
            }
            let batch = match self.ctx.call(daemon.next_route_batch(family)).await {
                Ok(batch) => batch,
                Err(err) => {
                    warn!("{} route sync aborted after {} routes: {}", family, count, err);
                    break Ok(false);
                }
            };
            for route in batch.routes.iter() {
                if self.ingest.on_advertise(route).await.is_err() {
                    dropped += 1;
                }
                count += 1;
            }
            if batch.done {
                break Ok(true);
            }
        };
        if let Err(err) = self.ctx.call(daemon.close_route_sync(family)).await {
            trace!("Closing {} route sync: {}", family, err);
        }
        if let Ok(true) = drained {
            debug!("Pulled {} {} routes ({} dropped)", count, family, dropped);
        }
        drained
    }
}

fn check(token: &CancellationToken) -> Step<()> {
    if token.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}
