//! Dead-letter store for events that exhausted their retry budget.
//!
//! Dead-lettered events are no longer retried automatically. They are
//! retained for a bounded window for inspection and manual requeue, then
//! become eligible for the periodic sweep.

use beacon_core::Event;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A dead-lettered event with its failure context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub event: Event,
    /// Delivery attempts made before giving up.
    pub attempts: u32,
    /// Error from the last failed delivery.
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// In-memory dead-letter store.
#[derive(Debug, Default)]
pub struct DeadLetterStore {
    entries: Mutex<Vec<DeadLetter>>,
}

impl DeadLetterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event, attempts: u32, last_error: impl Into<String>) {
        let last_error = last_error.into();
        warn!(
            event_id = %event.id,
            site_id = %event.site_id,
            attempts = attempts,
            error = %last_error,
            "Event dead-lettered"
        );
        self.entries.lock().push(DeadLetter {
            event,
            attempts,
            last_error,
            dead_lettered_at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Snapshot of all retained dead letters.
    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries.lock().clone()
    }

    /// Removes and returns all retained dead letters (manual requeue path).
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Discards entries older than the retention window. Returns the
    /// number swept.
    pub fn sweep_expired(&self, retention: chrono::Duration, now: DateTime<Utc>) -> usize {
        let cutoff = now - retention;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.dead_lettered_at > cutoff);
        before - entries.len()
    }
}
