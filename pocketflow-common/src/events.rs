//! Batch event types and EventBus
//!
//! The batch coordinator reports progress by emitting [`BatchEvent`]s on an
//! [`EventBus`] handed to it by the caller. Any number of subscribers (console
//! progress, tests) can listen; emitting with no subscribers is harmless.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Batch progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    /// Discovery finished and workers are about to start
    BatchStarted {
        /// Identifier for this batch run
        run_id: Uuid,
        /// Number of structure files discovered
        total_items: usize,
        /// Worker pool size
        max_workers: usize,
        /// When the batch started
        timestamp: DateTime<Utc>,
    },

    /// A worker picked up an item
    ItemStarted {
        run_id: Uuid,
        /// Position of the item in discovery order
        index: usize,
        /// Structure name (file stem)
        name: String,
        timestamp: DateTime<Utc>,
    },

    /// A worker finished an item (successfully or not)
    ItemCompleted {
        run_id: Uuid,
        index: usize,
        name: String,
        /// `success`, `failed` or `skipped`
        status: String,
        /// Error text for failed items
        error: Option<String>,
        /// Items finished so far, including this one
        completed: usize,
        total: usize,
        elapsed_seconds: f64,
        timestamp: DateTime<Utc>,
    },

    /// All workers joined and the aggregate report was written
    BatchCompleted {
        run_id: Uuid,
        total: usize,
        succeeded: usize,
        failed: usize,
        elapsed_seconds: f64,
        timestamp: DateTime<Utc>,
    },
}

impl BatchEvent {
    /// Run identifier carried by every event
    pub fn run_id(&self) -> Uuid {
        match self {
            BatchEvent::BatchStarted { run_id, .. }
            | BatchEvent::ItemStarted { run_id, .. }
            | BatchEvent::ItemCompleted { run_id, .. }
            | BatchEvent::BatchCompleted { run_id, .. } => *run_id,
        }
    }
}

/// Broadcast channel for batch events
///
/// Cloning an EventBus yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BatchEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: BatchEvent,
    ) -> Result<usize, broadcast::error::SendError<BatchEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: BatchEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
