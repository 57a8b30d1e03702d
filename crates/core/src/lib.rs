//! Core types, validation, and errors for the beacon analytics pipeline.

pub mod error;
pub mod events;
pub mod limits;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use events::*;
pub use session::*;
pub use stats::*;
