//! Session tracker.
//!
//! Applies every event in a flushed batch to its session row through the
//! store's atomic touch primitive. The worker never does
//! read-modify-write on session rows; concurrent batches touching the
//! same session are serialized by the storage layer.

use beacon_core::{Event, Result};
use std::sync::Arc;
use storage::Store;

pub struct SessionTracker {
    store: Arc<dyn Store>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Touches the session row of every event, in batch order.
    pub async fn touch_batch(&self, events: &[Event]) -> Result<()> {
        for event in events {
            self.store.touch_session(event).await?;
        }
        Ok(())
    }
}
