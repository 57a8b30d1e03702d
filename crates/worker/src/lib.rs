//! Worker tier of the beacon pipeline.
//!
//! Consumes deliveries from the durable queue, coalesces them into
//! batches, enriches and aggregates them into daily stats buckets and
//! session rows, and runs the periodic session-metric recalculation.

pub mod accumulator;
pub mod aggregator;
pub mod config;
pub mod enrichment;
pub mod pipeline;
pub mod recalc;
pub mod scheduler;
pub mod sessions;

pub use accumulator::{Batch, BatchAccumulator};
pub use aggregator::AggregationEngine;
pub use config::WorkerConfig;
pub use enrichment::Enricher;
pub use pipeline::Pipeline;
pub use recalc::{DirtySet, RecalcWorker};
pub use scheduler::WorkerScheduler;
pub use sessions::SessionTracker;
