use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::pending;
use log::{debug, error, info, trace, warn};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::{self, JoinError, JoinHandle};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use super::{
    Context, JobOutcome, ReplayOrchestrator, ReplayResult, ReplayResults, ReplayState,
    RouteIngestPipeline, REPLAY_STATUS_PATH,
};
use crate::config::WriteBehindQueue;
use crate::models::RouteKey;

#[derive(Debug)]
enum Command {
    TriggerReplay,
    CancelAll(oneshot::Sender<()>),
    Shutdown,
}

/// Handle to the single worker that serializes replay jobs and stale sweeps
pub struct ReconciliationScheduler {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<Option<ReplayState>>,
    cleanup_pending: Arc<AtomicBool>,
    results: ReplayResults,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ReconciliationScheduler {
    /// Must be called from within a tokio runtime
    pub(crate) fn spawn(
        ctx: Arc<Context>,
        ingest: RouteIngestPipeline,
        publisher: Option<WriteBehindQueue>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(None);
        let cleanup_pending = Arc::new(AtomicBool::new(false));
        let results = ReplayResults::new(ctx.settings.replay_results_capacity);
        let worker = Worker {
            ctx,
            ingest,
            state: Arc::new(state_tx),
            cleanup_pending: cleanup_pending.clone(),
            results: results.clone(),
            publisher,
            job: None,
            cleanup: None,
        };
        let handle = tokio::spawn(worker.run(rx));
        Self {
            tx,
            state,
            cleanup_pending,
            results,
            worker: Mutex::new(Some(handle)),
        }
    }

    /// Start a replay, superseding any job or sweep still in flight
    pub fn trigger_replay(&self) {
        if self.tx.send(Command::TriggerReplay).is_err() {
            warn!("Scheduler stopped, replay not triggered");
        }
    }

    /// Cancel the running job and any pending sweep, waiting until both stopped
    pub async fn cancel_all(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::CancelAll(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.worker.lock().await.take() {
            if let Err(err) = handle.await {
                error!("Scheduler worker failed: {}", err);
            }
        }
    }

    /// State of the latest job, None before the first one
    pub fn state(&self) -> Option<ReplayState> {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<ReplayState>> {
        self.state.clone()
    }

    pub fn cleanup_pending(&self) -> bool {
        self.cleanup_pending.load(Ordering::SeqCst)
    }

    pub fn results(&self) -> &ReplayResults {
        &self.results
    }
}

struct RunningJob {
    token: CancellationToken,
    handle: JoinHandle<JobOutcome>,
}

struct PendingCleanup {
    token: CancellationToken,
    outcome: JobOutcome,
    // None when cancelled before the timer fired
    handle: JoinHandle<Option<usize>>,
}

struct Worker {
    ctx: Arc<Context>,
    ingest: RouteIngestPipeline,
    state: Arc<watch::Sender<Option<ReplayState>>>,
    cleanup_pending: Arc<AtomicBool>,
    results: ReplayResults,
    publisher: Option<WriteBehindQueue>,
    job: Option<RunningJob>,
    cleanup: Option<PendingCleanup>,
}

async fn join_job(job: &mut Option<RunningJob>) -> Result<JobOutcome, JoinError> {
    match job {
        Some(job) => (&mut job.handle).await,
        None => pending().await,
    }
}

async fn join_cleanup(cleanup: &mut Option<PendingCleanup>) -> Result<Option<usize>, JoinError> {
    match cleanup {
        Some(cleanup) => (&mut cleanup.handle).await,
        None => pending().await,
    }
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::TriggerReplay) => self.trigger().await,
                    Some(Command::CancelAll(ack)) => {
                        self.cancel_all(false).await;
                        let _ = ack.send(());
                    }
                    Some(Command::Shutdown) | None => {
                        self.cancel_all(false).await;
                        break;
                    }
                },
                outcome = join_job(&mut self.job), if self.job.is_some() => {
                    self.job = None;
                    match outcome {
                        Ok(outcome) => self.job_finished(outcome),
                        Err(err) => error!("Replay job failed: {}", err),
                    }
                }
                cleared = join_cleanup(&mut self.cleanup), if self.cleanup.is_some() => {
                    self.cleanup_pending.store(false, Ordering::SeqCst);
                    if let Some(cleanup) = self.cleanup.take() {
                        match cleared {
                            Ok(cleared) => self.record(cleanup.outcome, cleared),
                            Err(err) => error!("Stale cleanup failed: {}", err),
                        }
                    }
                }
            }
        }
        debug!("Scheduler worker stopped");
    }

    async fn trigger(&mut self) {
        if self.job.is_some() || self.cleanup.is_some() {
            info!("Superseding in-flight replay");
            self.cancel_all(true).await;
        }
        let token = CancellationToken::new();
        let orchestrator =
            ReplayOrchestrator::new(self.ctx.clone(), self.ingest.clone(), self.state.clone());
        let job_token = token.clone();
        let handle = tokio::spawn(async move { orchestrator.run(&job_token).await });
        info!("Replay started");
        self.job = Some(RunningJob { token, handle });
    }

    /// Cancel the job and sweep, optionally wait out the grace interval,
    /// then wait for both to stop before discarding the stale snapshot
    async fn cancel_all(&mut self, grace: bool) {
        let job = self.job.take();
        let cleanup = self.cleanup.take();
        if job.is_none() && cleanup.is_none() {
            return;
        }
        if let Some(job) = &job {
            job.token.cancel();
        }
        if let Some(cleanup) = &cleanup {
            cleanup.token.cancel();
        }
        if grace {
            sleep(self.ctx.settings.grace_interval).await;
        }
        if let Some(job) = job {
            match job.handle.await {
                Ok(outcome) => self.record(outcome, None),
                Err(err) => error!("Replay job failed: {}", err),
            }
        }
        if let Some(cleanup) = cleanup {
            match cleanup.handle.await {
                Ok(cleared) => self.record(cleanup.outcome, cleared),
                Err(err) => error!("Stale cleanup failed: {}", err),
            }
        }
        self.cleanup_pending.store(false, Ordering::SeqCst);
        self.ctx.lock().await.stale.clear();
    }

    fn job_finished(&mut self, outcome: JobOutcome) {
        match outcome.cleanup_after {
            Some(delay) => {
                let token = CancellationToken::new();
                let handle = tokio::spawn(stale_cleanup(self.ctx.clone(), delay, token.clone()));
                self.cleanup_pending.store(true, Ordering::SeqCst);
                self.cleanup = Some(PendingCleanup {
                    token,
                    outcome,
                    handle,
                });
            }
            None => self.record(outcome, None),
        }
    }

    fn record(&self, outcome: JobOutcome, cleared_count: Option<usize>) {
        let result = ReplayResult {
            started: outcome.started,
            ended: Utc::now(),
            state: outcome.state,
            succeeded: outcome.succeeded,
            stale_count: outcome.stale_count,
            cleared_count,
        };
        info!(
            "Replay finished: state={} succeeded={} stale={} cleared={:?}",
            result.state, result.succeeded, result.stale_count, result.cleared_count
        );
        if let Some(publisher) = &self.publisher {
            match serde_json::to_value(&result) {
                Ok(value) => publisher.update(REPLAY_STATUS_PATH, value),
                Err(err) => warn!("Unable to publish replay result: {}", err),
            }
        }
        self.results.push(result);
    }
}

/// Wait `delay`, then delete every route still unconfirmed.
/// Returns None if cancelled before the timer fired.
///
/// Entries leave the shared table and the forwarding database together under
/// the state lock, so an advertisement either reconfirms an entry before the
/// sweep reaches it or finds it already deleted and writes it back.
async fn stale_cleanup(
    ctx: Arc<Context>,
    delay: Duration,
    token: CancellationToken,
) -> Option<usize> {
    tokio::select! {
        _ = token.cancelled() => {
            trace!("Stale cleanup cancelled before firing");
            return None;
        }
        _ = sleep(delay) => {}
    }
    let batch_size = ctx.settings.cleanup_batch_size.max(1);
    let mut cleared = 0;
    loop {
        if token.is_cancelled() {
            ctx.lock().await.stale.clear();
            info!("Stale cleanup cancelled after {} routes", cleared);
            return Some(cleared);
        }
        let mut state = ctx.lock().await;
        let batch = state.stale.pop_batch(batch_size);
        if batch.is_empty() {
            break;
        }
        for entry in batch {
            match ctx
                .fib
                .delete_route_path(&entry.rd, &entry.path.prefix, &entry.path.next_hop)
            {
                Ok(()) => {
                    let key = RouteKey::new(&entry.rd, entry.path.prefix, entry.path.next_hop);
                    state.routes.remove(&key);
                    cleared += 1;
                }
                Err(err) => warn!(
                    "Unable to delete stale route [{}] {}: {}",
                    entry.rd, entry.path, err
                ),
            }
        }
        drop(state);
        task::yield_now().await;
    }
    info!("Stale cleanup removed {} routes", cleared);
    Some(cleared)
}
