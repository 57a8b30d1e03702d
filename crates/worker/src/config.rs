//! Worker configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker tier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent consumer tasks draining the queue.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Buffer size that triggers an immediate flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Idle flush timeout, measured from the first buffered-but-unflushed
    /// event.
    #[serde(default = "default_batch_idle_timeout_ms")]
    pub batch_idle_timeout_ms: u64,
    /// A flush that has not completed within this bound is treated as
    /// failed and the batch is nacked.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Session-metric recalculation interval.
    #[serde(default = "default_recalc_interval_secs")]
    pub recalc_interval_secs: u64,
    /// How often the metrics snapshot is logged.
    #[serde(default = "default_metrics_log_interval_secs")]
    pub metrics_log_interval_secs: u64,
}

fn default_concurrency() -> usize {
    10
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_idle_timeout_ms() -> u64 {
    1_000
}

fn default_flush_timeout_ms() -> u64 {
    10_000
}

fn default_recalc_interval_secs() -> u64 {
    30
}

fn default_metrics_log_interval_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            batch_size: default_batch_size(),
            batch_idle_timeout_ms: default_batch_idle_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
            recalc_interval_secs: default_recalc_interval_secs(),
            metrics_log_interval_secs: default_metrics_log_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn batch_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_idle_timeout_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn recalc_interval(&self) -> Duration {
        Duration::from_secs(self.recalc_interval_secs)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_secs)
    }
}
