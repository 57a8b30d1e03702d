//! Batch accumulator.
//!
//! Coalesces queue deliveries into storage-sized batches to amortize
//! round-trips. Correctness never depends on which batch an event lands
//! in; batching is purely a write-amplification optimization.

use parking_lot::Mutex;
use queue::Delivery;
use std::time::Duration;
use telemetry::metrics;
use tokio::time::Instant;

/// A flushed batch, carrying the deliveries so the pipeline can ack or
/// nack each against the queue.
#[derive(Debug)]
pub struct Batch {
    pub deliveries: Vec<Delivery>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }
}

#[derive(Debug, Default)]
struct Buffer {
    deliveries: Vec<Delivery>,
    /// Armed on the empty-to-non-empty transition; the idle flush fires
    /// once it is older than the timeout.
    opened_at: Option<Instant>,
}

impl Buffer {
    fn take(&mut self) -> Batch {
        self.opened_at = None;
        Batch {
            deliveries: std::mem::take(&mut self.deliveries),
        }
    }
}

/// Accumulates deliveries until a size or idle threshold is reached.
///
/// Buffer mutation and the flush decision share one mutex, so a
/// size-triggered flush and a concurrent idle flush can never both take
/// the same events.
pub struct BatchAccumulator {
    max_size: usize,
    idle_timeout: Duration,
    buffer: Mutex<Buffer>,
}

impl BatchAccumulator {
    pub fn new(max_size: usize, idle_timeout: Duration) -> Self {
        Self {
            max_size,
            idle_timeout,
            buffer: Mutex::new(Buffer::default()),
        }
    }

    /// Buffers one delivery. Returns the full batch when the buffer
    /// reaches the size threshold.
    pub fn add(&self, delivery: Delivery) -> Option<Batch> {
        let mut buffer = self.buffer.lock();
        if buffer.deliveries.is_empty() {
            buffer.opened_at = Some(Instant::now());
        }
        buffer.deliveries.push(delivery);

        let batch = if buffer.deliveries.len() >= self.max_size {
            Some(buffer.take())
        } else {
            None
        };
        metrics().buffer_depth.set(buffer.deliveries.len() as u64);
        batch
    }

    /// Takes the buffered batch once the idle timeout has elapsed since
    /// the first buffered event. Called by the scheduler's ticker.
    pub fn take_aged(&self) -> Option<Batch> {
        let mut buffer = self.buffer.lock();
        let aged = buffer
            .opened_at
            .is_some_and(|opened| opened.elapsed() >= self.idle_timeout);
        if !aged || buffer.deliveries.is_empty() {
            return None;
        }
        let batch = buffer.take();
        metrics().buffer_depth.set(0);
        Some(batch)
    }

    /// Takes whatever is buffered regardless of size or age. Shutdown
    /// path.
    pub fn drain(&self) -> Option<Batch> {
        let mut buffer = self.buffer.lock();
        if buffer.deliveries.is_empty() {
            return None;
        }
        let batch = buffer.take();
        metrics().buffer_depth.set(0);
        Some(batch)
    }

    /// Current buffered delivery count.
    pub fn len(&self) -> usize {
        self.buffer.lock().deliveries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().deliveries.is_empty()
    }
}
