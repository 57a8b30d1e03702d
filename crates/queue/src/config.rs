//! Queue configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Durable queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum queued events (ready + awaiting retry) before enqueue
    /// fails with backpressure.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Retry attempts before an event dead-letters.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base retry delay in milliseconds; doubles each retry.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// How long dead-lettered events are retained before the sweep
    /// discards them.
    #[serde(default = "default_dead_letter_retention_secs")]
    pub dead_letter_retention_secs: u64,
    /// How often the dead-letter sweep runs.
    #[serde(default = "default_dead_letter_sweep_secs")]
    pub dead_letter_sweep_secs: u64,
}

fn default_capacity() -> usize {
    10_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    2_000
}

fn default_dead_letter_retention_secs() -> u64 {
    86_400
}

fn default_dead_letter_sweep_secs() -> u64 {
    3_600
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            dead_letter_retention_secs: default_dead_letter_retention_secs(),
            dead_letter_sweep_secs: default_dead_letter_sweep_secs(),
        }
    }
}

impl QueueConfig {
    /// Backoff before retry number `retry` (1-based): base × 2^(retry-1).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64 << (retry.saturating_sub(1)).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }

    pub fn dead_letter_retention(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.dead_letter_retention_secs as i64)
    }
}
