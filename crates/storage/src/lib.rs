//! Storage abstraction for the beacon pipeline.
//!
//! All aggregate mutations go through atomic per-document upsert
//! primitives (increment, set-union, field-set); the pipeline never does
//! read-modify-write in application code. The design deliberately avoids
//! cross-document transactions, trading strict consistency for horizontal
//! scalability of the worker tier.

pub mod memory;
pub mod reports;
pub mod store;

pub use memory::MemoryStore;
pub use reports::{range_summary, RangeSummary};
pub use store::Store;
