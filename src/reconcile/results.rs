use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReplayState;
use crate::utils::BoundedLog;

/// Config-tree path where the latest replay result is published
pub const REPLAY_STATUS_PATH: &str = "bgp/replay-status";

/// Immutable summary of one finished replay job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    pub started: DateTime<Utc>,
    pub ended: DateTime<Utc>,
    pub state: ReplayState,
    pub succeeded: bool,
    pub stale_count: usize,
    /// Routes removed by the stale sweep, None if no sweep ran
    pub cleared_count: Option<usize>,
}

/// Most recent replay results, oldest first
#[derive(Clone)]
pub struct ReplayResults {
    inner: Arc<Mutex<BoundedLog<ReplayResult>>>,
}

impl ReplayResults {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedLog::new(capacity))),
        }
    }

    pub(crate) fn push(&self, result: ReplayResult) {
        if let Ok(mut results) = self.inner.lock() {
            results.push(result);
        }
    }

    pub fn all(&self) -> Vec<ReplayResult> {
        self.inner
            .lock()
            .map(|results| results.to_vec())
            .unwrap_or_default()
    }

    pub fn last(&self) -> Option<ReplayResult> {
        self.inner
            .lock()
            .ok()
            .and_then(|results| results.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|results| results.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
