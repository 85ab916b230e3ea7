use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use log::{info, trace};
use thiserror::Error;
use tokio::sync::watch;

/// Leader-election result for this instance
pub trait OwnershipOracle: Send + Sync {
    fn is_owner(&self) -> bool;
    /// Receives the new ownership value on every change
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Oracle whose answer is set locally, for single-instance deployments and tests
pub struct StaticOwnership {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl StaticOwnership {
    pub fn new(owner: bool) -> Self {
        let (tx, rx) = watch::channel(owner);
        Self { tx, rx }
    }

    pub fn set_owner(&self, owner: bool) {
        if *self.rx.borrow() == owner {
            return;
        }
        info!("Ownership set to {}", owner);
        // A receiver is always held, so send cannot fail
        let _ = self.tx.send(owner);
    }
}

impl OwnershipOracle for StaticOwnership {
    fn is_owner(&self) -> bool {
        *self.rx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }
}

#[derive(Debug, Error)]
#[error("{service}: {reason}")]
pub struct ServiceError {
    pub service: &'static str,
    pub reason: String,
}

/// A service this node exposes only while it holds ownership
#[async_trait]
pub trait InboundService: Send + Sync {
    async fn start(&self) -> Result<(), ServiceError>;
    async fn stop(&self);
}

/// Result of an operation passed through the gate
#[derive(Debug, PartialEq, Eq)]
pub enum Gated<T> {
    Executed(T),
    NotOwner,
}

impl<T> Gated<T> {
    pub fn executed(self) -> Option<T> {
        match self {
            Gated::Executed(value) => Some(value),
            Gated::NotOwner => None,
        }
    }

    pub fn is_executed(&self) -> bool {
        matches!(self, Gated::Executed(_))
    }
}

/// Runs state-mutating operations only on the elected owner
#[derive(Clone)]
pub struct OwnershipGate {
    oracle: Arc<dyn OwnershipOracle>,
}

impl OwnershipGate {
    pub fn new(oracle: Arc<dyn OwnershipOracle>) -> Self {
        Self { oracle }
    }

    pub fn is_owner(&self) -> bool {
        self.oracle.is_owner()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.oracle.subscribe()
    }

    /// `op` is not polled at all unless this instance is the owner
    pub async fn guarded<F, T>(&self, what: &str, op: F) -> Gated<T>
    where
        F: Future<Output = T>,
    {
        if !self.oracle.is_owner() {
            trace!("Not owner, skipping {}", what);
            return Gated::NotOwner;
        }
        Gated::Executed(op.await)
    }
}
