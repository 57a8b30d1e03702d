//! The pipeline facade.
//!
//! Ties ingestion, the durable queue, batching, enrichment, aggregation,
//! session tracking, and recalculation together behind one handle.
//! Ingestion and processing are fully decoupled: `ingest` returns as
//! soon as the event is queued.

use beacon_core::{validate_raw, Error, Event, RawEvent, Result};
use chrono::Utc;
use queue::{Delivery, DurableQueue};
use std::sync::Arc;
use std::time::Instant;
use storage::Store;
use telemetry::metrics;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::accumulator::{Batch, BatchAccumulator};
use crate::aggregator::AggregationEngine;
use crate::config::WorkerConfig;
use crate::enrichment::Enricher;
use crate::recalc::{DirtySet, RecalcWorker};
use crate::sessions::SessionTracker;

pub struct Pipeline {
    config: WorkerConfig,
    queue: Arc<DurableQueue>,
    store: Arc<dyn Store>,
    accumulator: BatchAccumulator,
    aggregator: AggregationEngine,
    sessions: SessionTracker,
    enricher: Enricher,
    dirty: Arc<DirtySet>,
    recalc: RecalcWorker,
    /// Serializes flushes. Buffer mutation is covered by the
    /// accumulator's own mutex; this lock covers the storage writes.
    flush_lock: tokio::sync::Mutex<()>,
}

impl Pipeline {
    pub fn new(config: WorkerConfig, queue: Arc<DurableQueue>, store: Arc<dyn Store>) -> Arc<Self> {
        let dirty = Arc::new(DirtySet::new());
        Arc::new(Self {
            accumulator: BatchAccumulator::new(config.batch_size, config.batch_idle_timeout()),
            aggregator: AggregationEngine::new(store.clone(), dirty.clone()),
            sessions: SessionTracker::new(store.clone()),
            enricher: Enricher::new(),
            recalc: RecalcWorker::new(store.clone(), dirty.clone()),
            flush_lock: tokio::sync::Mutex::new(()),
            config,
            queue,
            store,
            dirty,
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<DurableQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn dirty(&self) -> &Arc<DirtySet> {
        &self.dirty
    }

    pub fn recalc(&self) -> &RecalcWorker {
        &self.recalc
    }

    /// Validates, normalizes, and enqueues one raw event for the
    /// authenticated site. Returns the assigned event id without waiting
    /// on any downstream processing.
    pub fn ingest(&self, raw: RawEvent, site_id: &str) -> Result<Uuid> {
        let event = match validate_raw(raw, site_id, Utc::now()) {
            Ok(event) => event,
            Err(e) => {
                metrics().events_rejected.inc();
                return Err(e);
            }
        };
        metrics().events_received.inc();

        let id = event.id;
        self.queue.enqueue(event)?;
        Ok(id)
    }

    /// One consumer task: drains the queue into the accumulator until
    /// the queue is closed and empty.
    pub async fn consume(&self) {
        while let Some(delivery) = self.queue.dequeue().await {
            if let Some(batch) = self.accumulator.add(delivery) {
                self.flush(batch).await;
            }
        }
        debug!("Consumer draining complete");
    }

    /// Flushes the buffered batch whose idle timeout has elapsed, if any.
    pub async fn flush_aged(&self) {
        if let Some(batch) = self.accumulator.take_aged() {
            self.flush(batch).await;
        }
    }

    /// Flushes whatever is buffered. Shutdown path.
    pub async fn drain(&self) {
        if let Some(batch) = self.accumulator.drain() {
            self.flush(batch).await;
        }
    }

    /// Applies one batch to storage, then acks every delivery on
    /// success or nacks every delivery on failure. A flush that exceeds
    /// the configured timeout counts as failed rather than being left in
    /// an indeterminate state.
    async fn flush(&self, batch: Batch) {
        let _guard = self.flush_lock.lock().await;
        let start = Instant::now();

        let mut events: Vec<Event> = batch.deliveries.iter().map(|d| d.event.clone()).collect();
        self.enricher.enrich_batch(&mut events);

        let result = match tokio::time::timeout(self.config.flush_timeout(), self.apply(&events))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::internal(format!(
                "flush timed out after {}ms",
                self.config.flush_timeout_ms
            ))),
        };

        match result {
            Ok(()) => {
                for delivery in &batch.deliveries {
                    self.queue.ack(delivery);
                }
                metrics().batches_flushed.inc();
                metrics()
                    .flush_latency_ms
                    .observe(start.elapsed().as_millis() as u64);
                debug!(events = batch.len(), "Flushed batch");
            }
            Err(e) => {
                warn!(events = batch.len(), error = %e, "Batch flush failed, nacking");
                metrics().batch_flush_failures.inc();
                let reason = e.to_string();
                for delivery in batch.deliveries {
                    self.queue.nack(delivery, &reason);
                }
            }
        }
    }

    async fn apply(&self, events: &[Event]) -> Result<()> {
        self.aggregator.apply(events).await?;
        self.sessions.touch_batch(events).await?;
        Ok(())
    }
}
