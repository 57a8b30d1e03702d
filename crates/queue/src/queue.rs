//! The durable queue itself.
//!
//! Ingestion and processing are fully decoupled: `enqueue` records the
//! event and returns without waiting on any consumer, while any number of
//! workers await `dequeue` concurrently. A delivery is removed for good
//! only when the consumer acks it; a nack re-schedules it after the
//! configured backoff until the retry budget is spent.

use beacon_core::{Error, Event, Result};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use telemetry::metrics;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::QueueConfig;
use crate::dead_letter::DeadLetterStore;

/// One in-flight delivery of an event.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub event: Event,
    /// Delivery attempts including this one. 1 on first delivery.
    pub attempts: u32,
}

/// An event parked until its retry backoff elapses.
#[derive(Debug)]
struct Parked {
    due: Instant,
    seq: u64,
    delivery: Delivery,
}

// Min-heap on due time; seq breaks ties FIFO.
impl Ord for Parked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Parked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Parked {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Parked {}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Delivery>,
    parked: BinaryHeap<Parked>,
    next_seq: u64,
    closed: bool,
}

impl State {
    fn depth(&self) -> usize {
        self.ready.len() + self.parked.len()
    }

    /// Moves every parked delivery whose backoff has elapsed to the
    /// ready queue.
    fn promote_due(&mut self, now: Instant) {
        while self.parked.peek().is_some_and(|p| p.due <= now) {
            if let Some(parked) = self.parked.pop() {
                self.ready.push_back(parked.delivery);
            }
        }
    }
}

/// Durable in-process queue with at-least-once delivery.
pub struct DurableQueue {
    config: QueueConfig,
    state: Mutex<State>,
    notify: Notify,
    dead_letters: DeadLetterStore,
}

impl DurableQueue {
    pub fn new(config: QueueConfig) -> Arc<Self> {
        info!(
            capacity = config.capacity,
            max_retries = config.max_retries,
            retry_base_delay_ms = config.retry_base_delay_ms,
            "Creating durable queue"
        );
        Arc::new(Self {
            config,
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            dead_letters: DeadLetterStore::new(),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    pub fn dead_letters(&self) -> &DeadLetterStore {
        &self.dead_letters
    }

    /// Records a validated event for delivery and returns immediately.
    /// Never waits on downstream processing.
    pub fn enqueue(&self, event: Event) -> Result<()> {
        let depth = {
            let mut state = self.state.lock();
            if state.closed {
                return Err(Error::QueueClosed);
            }
            if state.depth() >= self.config.capacity {
                return Err(Error::QueueFull);
            }
            state.ready.push_back(Delivery { event, attempts: 1 });
            state.depth()
        };

        metrics().events_enqueued.inc();
        metrics().queue_depth.set(depth as u64);
        self.notify.notify_one();
        Ok(())
    }

    /// Awaits the next deliverable event.
    ///
    /// Returns `None` only once the queue is closed and fully drained
    /// (including parked retries).
    pub async fn dequeue(&self) -> Option<Delivery> {
        loop {
            // Register interest before inspecting state so a concurrent
            // enqueue/nack cannot slip between check and await.
            let notified = self.notify.notified();

            let next_due = {
                let mut state = self.state.lock();
                state.promote_due(Instant::now());
                if let Some(delivery) = state.ready.pop_front() {
                    metrics().queue_depth.set(state.depth() as u64);
                    return Some(delivery);
                }
                if state.closed && state.parked.is_empty() {
                    return None;
                }
                state.parked.peek().map(|p| p.due)
            };

            match next_due {
                Some(due) => {
                    tokio::select! {
                        _ = notified => {}
                        _ = tokio::time::sleep_until(due) => {}
                    }
                }
                None => notified.await,
            }
        }
    }

    /// Acknowledges a delivery: the event completed processing and leaves
    /// the queue for good.
    pub fn ack(&self, delivery: &Delivery) {
        metrics().events_acked.inc();
        debug!(event_id = %delivery.event.id, attempts = delivery.attempts, "Acked delivery");
    }

    /// Releases a failed delivery for retry, or dead-letters it once the
    /// retry budget is exhausted.
    pub fn nack(&self, delivery: Delivery, reason: &str) {
        let retries_done = delivery.attempts.saturating_sub(1);
        if retries_done >= self.config.max_retries {
            metrics().events_dead_lettered.inc();
            self.dead_letters
                .push(delivery.event, delivery.attempts, reason);
            self.notify.notify_one();
            return;
        }

        let retry = retries_done + 1;
        let backoff = self.config.backoff(retry);
        debug!(
            event_id = %delivery.event.id,
            retry = retry,
            backoff_ms = backoff.as_millis() as u64,
            reason = %reason,
            "Scheduling retry"
        );

        {
            let mut state = self.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            state.parked.push(Parked {
                due: Instant::now() + backoff,
                seq,
                delivery: Delivery {
                    event: delivery.event,
                    attempts: delivery.attempts + 1,
                },
            });
        }

        metrics().events_retried.inc();
        self.notify.notify_one();
    }

    /// Requeues all retained dead letters for fresh delivery. Manual
    /// intervention path; resets the attempt counter.
    pub fn requeue_dead_letters(&self) -> usize {
        let drained = self.dead_letters.drain();
        let count = drained.len();
        {
            let mut state = self.state.lock();
            for dl in drained {
                state.ready.push_back(Delivery {
                    event: dl.event,
                    attempts: 1,
                });
            }
        }
        if count > 0 {
            info!(count = count, "Requeued dead letters");
            self.notify.notify_waiters();
        }
        count
    }

    /// Discards dead letters older than the retention window.
    pub fn sweep_dead_letters(&self) -> usize {
        let swept = self
            .dead_letters
            .sweep_expired(self.config.dead_letter_retention(), chrono::Utc::now());
        if swept > 0 {
            metrics().dead_letters_swept.inc_by(swept as u64);
        }
        swept
    }

    /// Current queued depth (ready + parked).
    pub fn depth(&self) -> usize {
        self.state.lock().depth()
    }

    /// Closes the queue for shutdown. Enqueues fail from here on;
    /// consumers drain what remains and then observe end-of-queue.
    pub fn close(&self) {
        {
            let mut state = self.state.lock();
            state.closed = true;
        }
        info!("Durable queue closed");
        self.notify.notify_waiters();
    }
}
