//! Durable in-process event queue for the beacon pipeline.
//!
//! Delivery is at-least-once: a dequeued event stays in flight until the
//! consumer acks it, and a nack re-schedules it with exponential backoff
//! until the retry budget is exhausted and it dead-letters.

pub mod config;
pub mod dead_letter;
pub mod queue;

pub use config::QueueConfig;
pub use dead_letter::{DeadLetter, DeadLetterStore};
pub use queue::{Delivery, DurableQueue};
