use std::future::Future;

use log::{debug, warn};
use tokio_util::sync::CancellationToken;

use crate::daemon::{DaemonError, DaemonResult};

/// Bounded attempt budget for one logical unit of work.
/// Never shared between units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    remaining: u32,
}

impl RetryCounter {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            remaining: max_attempts,
        }
    }

    pub fn error_occurred(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }

    pub fn should_retry(&self) -> bool {
        self.remaining > 0
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[derive(Debug, PartialEq)]
pub(crate) enum RetryOutcome<T> {
    Succeeded(T),
    Exhausted(DaemonError),
    Cancelled,
}

/// Run `op` until it succeeds, its own counter of `attempts` runs out,
/// or `token` is cancelled. The token is checked before every attempt.
pub(crate) async fn with_retry<T, F, Fut>(
    what: &str,
    attempts: u32,
    token: &CancellationToken,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DaemonResult<T>>,
{
    let mut counter = RetryCounter::new(attempts);
    loop {
        if token.is_cancelled() {
            return RetryOutcome::Cancelled;
        }
        match op().await {
            Ok(value) => return RetryOutcome::Succeeded(value),
            Err(err) => {
                counter.error_occurred();
                if !counter.should_retry() {
                    warn!("{} failed after {} attempts: {}", what, attempts, err);
                    return RetryOutcome::Exhausted(err);
                }
                debug!(
                    "{} failed ({}), {} attempts left",
                    what,
                    err,
                    counter.remaining()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_counter() {
        let mut counter = RetryCounter::new(3);
        assert!(counter.should_retry());
        counter.error_occurred();
        counter.error_occurred();
        assert!(counter.should_retry());
        counter.error_occurred();
        assert!(!counter.should_retry());
        counter.error_occurred();
        assert_eq!(counter.remaining(), 0);
    }

    #[tokio::test]
    async fn test_exhausts_after_attempts() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let outcome: RetryOutcome<()> = with_retry("op", 3, &token, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(DaemonError::Timeout)
        })
        .await;
        assert_eq!(outcome, RetryOutcome::Exhausted(DaemonError::Timeout));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_succeeds_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let outcome = with_retry("op", 3, &token, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(DaemonError::Transport("reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(outcome, RetryOutcome::Succeeded(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let outcome: RetryOutcome<()> =
            with_retry("op", 3, &token, || async { Ok(()) }).await;
        assert_eq!(outcome, RetryOutcome::Cancelled);
    }
}
