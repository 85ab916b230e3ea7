use std::fs;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

const MAX_BATCH: usize = 64;

/// Write access to the external configuration tree. Writes are
/// fire-and-forget; the reconciler never waits on their outcome
pub trait ConfigTreeWriter: Send + Sync {
    fn apply_update(&self, path: &str, value: Value);
    fn apply_delete(&self, path: &str);
}

#[derive(Debug)]
enum WriteOp {
    Update(String, Value),
    Delete(String),
}

impl WriteOp {
    fn path(&self) -> &str {
        match self {
            WriteOp::Update(path, _) => path,
            WriteOp::Delete(path) => path,
        }
    }
}

/// Queues config-tree writes and applies them in batches on a background task
#[derive(Clone)]
pub struct WriteBehindQueue {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl WriteBehindQueue {
    /// Must be called from within a tokio runtime
    pub fn spawn(writer: Arc<dyn ConfigTreeWriter>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<WriteOp>();
        tokio::spawn(async move {
            while let Some(first) = rx.recv().await {
                let mut batch = vec![first];
                while batch.len() < MAX_BATCH {
                    match rx.try_recv() {
                        Ok(op) => batch.push(op),
                        Err(_) => break,
                    }
                }
                let flushed = flush(writer.as_ref(), batch);
                debug!("Flushed {} config tree writes", flushed);
            }
            trace!("Write-behind queue closed");
        });
        Self { tx }
    }

    pub fn update(&self, path: &str, value: Value) {
        self.enqueue(WriteOp::Update(path.to_owned(), value));
    }

    pub fn delete(&self, path: &str) {
        self.enqueue(WriteOp::Delete(path.to_owned()));
    }

    fn enqueue(&self, op: WriteOp) {
        if let Err(err) = self.tx.send(op) {
            warn!("Dropped config tree write for {}", err.0.path());
        }
    }
}

// Later writes to the same path replace earlier ones within a batch
fn flush(writer: &dyn ConfigTreeWriter, batch: Vec<WriteOp>) -> usize {
    let mut pending: Vec<WriteOp> = Vec::with_capacity(batch.len());
    for op in batch {
        pending.retain(|p| p.path() != op.path());
        pending.push(op);
    }
    let count = pending.len();
    for op in pending {
        match op {
            WriteOp::Update(path, value) => writer.apply_update(&path, value),
            WriteOp::Delete(path) => writer.apply_delete(&path),
        }
    }
    count
}

/// Keeps written paths as one JSON document on disk,
/// for inspection when no external tree is available
pub struct FileConfigWriter {
    path: String,
    tree: Mutex<Map<String, Value>>,
}

impl FileConfigWriter {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            tree: Mutex::new(Map::new()),
        }
    }

    fn persist(&self, tree: &Map<String, Value>) {
        let contents = match serde_json::to_string_pretty(tree) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("Unable to serialize config tree: {}", err);
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, contents) {
            warn!("Unable to write config tree to {}: {}", self.path, err);
        }
    }
}

impl ConfigTreeWriter for FileConfigWriter {
    fn apply_update(&self, path: &str, value: Value) {
        if let Ok(mut tree) = self.tree.lock() {
            tree.insert(path.to_owned(), value);
            self.persist(&tree);
        }
    }

    fn apply_delete(&self, path: &str) {
        if let Ok(mut tree) = self.tree.lock() {
            if tree.remove(path).is_some() {
                self.persist(&tree);
            }
        }
    }
}
