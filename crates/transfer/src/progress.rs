//! Best-effort progress pub/sub.

use tokio::sync::broadcast;

use lectern_protocol::types::ProgressUpdate;

/// Default observer buffer. Lagging observers drop old updates.
const DEFAULT_CAPACITY: usize = 64;

/// Broadcasts task progress to any number of observers.
///
/// Delivery is at-most-once and unpersisted; publishing with no
/// observers is fine.
#[derive(Debug, Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressUpdate>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribes an observer. Updates published before the call are
    /// not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }

    /// Publishes an update to all current observers.
    pub fn publish(&self, update: ProgressUpdate) {
        // No observers is not an error.
        let _ = self.tx.send(update);
    }
}
