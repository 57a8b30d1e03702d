//! Periodic session-metric recalculation.
//!
//! The aggregator marks every bucket it touches dirty; this job drains
//! the dirty set on an interval (and once at shutdown), recomputes the
//! session-derived metrics for each key from the session rows, and
//! overwrites them on the bucket as a full snapshot. Always a
//! recomputation, never an incremental patch.

use beacon_core::{BucketKey, SessionMetrics};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use storage::Store;
use telemetry::metrics;
use tracing::{debug, info, warn};

/// Buckets awaiting session-metric recalculation.
///
/// Shared between the aggregator (marks) and the recalc job (drains).
#[derive(Debug, Default)]
pub struct DirtySet {
    keys: Mutex<HashSet<BucketKey>>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, key: BucketKey) {
        let mut keys = self.keys.lock();
        keys.insert(key);
        metrics().dirty_keys.set(keys.len() as u64);
    }

    /// Removes and returns all dirty keys.
    pub fn drain(&self) -> Vec<BucketKey> {
        let mut keys = self.keys.lock();
        metrics().dirty_keys.set(0);
        keys.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }
}

/// Recomputes session metrics for dirty buckets.
pub struct RecalcWorker {
    store: Arc<dyn Store>,
    dirty: Arc<DirtySet>,
}

impl RecalcWorker {
    pub fn new(store: Arc<dyn Store>, dirty: Arc<DirtySet>) -> Self {
        Self { store, dirty }
    }

    /// One recalculation pass over the current dirty set.
    ///
    /// A key whose recalculation fails is logged, counted, and re-marked
    /// dirty so the next run retries it; the run itself never aborts.
    /// Returns the number of keys successfully recalculated.
    pub async fn run_once(&self) -> usize {
        let keys = self.dirty.drain();
        if keys.is_empty() {
            return 0;
        }

        let start = Instant::now();
        let mut recalculated = 0;
        for key in keys {
            match self.recalculate_key(&key).await {
                Ok(computed) => {
                    recalculated += 1;
                    debug!(
                        bucket = %key,
                        sessions = computed.sessions_count,
                        bounce_rate = computed.bounce_rate,
                        "Recalculated session metrics"
                    );
                }
                Err(e) => {
                    warn!(bucket = %key, error = %e, "Session metric recalculation failed");
                    metrics().recalc_key_failures.inc();
                    self.dirty.mark(key);
                }
            }
        }

        metrics().recalc_runs.inc();
        metrics().recalc_keys_recalculated.inc_by(recalculated as u64);
        metrics()
            .recalc_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        info!(recalculated = recalculated, "Recalculation pass complete");
        recalculated
    }

    async fn recalculate_key(&self, key: &BucketKey) -> beacon_core::Result<SessionMetrics> {
        let sessions = self
            .store
            .sessions_started_on(&key.site_id, key.date)
            .await?;
        let computed = SessionMetrics::compute(&sessions);
        self.store.set_session_metrics(key, &computed).await?;
        Ok(computed)
    }
}
