//! Internal metrics collection.
//!
//! Collects metrics in-memory; the scheduler logs a snapshot on a fixed
//! interval as a structured tracing event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }
}

/// Collected metrics for the beacon pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub events_received: Counter,
    pub events_rejected: Counter,

    // Queue
    pub events_enqueued: Counter,
    pub events_acked: Counter,
    pub events_retried: Counter,
    pub events_dead_lettered: Counter,
    pub dead_letters_swept: Counter,

    // Batching and aggregation
    pub batches_flushed: Counter,
    pub batch_flush_failures: Counter,
    pub events_aggregated: Counter,
    pub buckets_upserted: Counter,
    pub sessions_touched: Counter,

    // Recalculation
    pub recalc_runs: Counter,
    pub recalc_keys_recalculated: Counter,
    pub recalc_key_failures: Counter,

    // Latency histograms
    pub flush_latency_ms: Histogram,
    pub recalc_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
    pub buffer_depth: Gauge,
    pub dirty_keys: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            events_received: self.events_received.get(),
            events_rejected: self.events_rejected.get(),
            events_enqueued: self.events_enqueued.get(),
            events_acked: self.events_acked.get(),
            events_retried: self.events_retried.get(),
            events_dead_lettered: self.events_dead_lettered.get(),
            batches_flushed: self.batches_flushed.get(),
            batch_flush_failures: self.batch_flush_failures.get(),
            events_aggregated: self.events_aggregated.get(),
            buckets_upserted: self.buckets_upserted.get(),
            sessions_touched: self.sessions_touched.get(),
            recalc_runs: self.recalc_runs.get(),
            recalc_key_failures: self.recalc_key_failures.get(),
            flush_latency_mean_ms: self.flush_latency_ms.mean(),
            recalc_latency_mean_ms: self.recalc_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            buffer_depth: self.buffer_depth.get(),
            dirty_keys: self.dirty_keys.get(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub events_received: u64,
    pub events_rejected: u64,
    pub events_enqueued: u64,
    pub events_acked: u64,
    pub events_retried: u64,
    pub events_dead_lettered: u64,
    pub batches_flushed: u64,
    pub batch_flush_failures: u64,
    pub events_aggregated: u64,
    pub buckets_upserted: u64,
    pub sessions_touched: u64,
    pub recalc_runs: u64,
    pub recalc_key_failures: u64,
    pub flush_latency_mean_ms: f64,
    pub recalc_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub buffer_depth: u64,
    pub dirty_keys: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
