//! Unified error types for the beacon pipeline.

use serde::Serialize;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A single violated field in a rejected event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    /// Field name as it appears on the wire.
    pub field: &'static str,
    /// Human-readable reason.
    pub reason: String,
}

/// Every violated field of a rejected input event, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<FieldViolation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a violation against a field.
    pub fn push(&mut self, field: &'static str, reason: impl Into<String>) {
        self.violations.push(FieldViolation {
            field,
            reason: reason.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Consumes the report, returning `Ok(())` when no field was violated.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for v in &self.violations {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", v.field, v.reason)?;
            first = false;
        }
        Ok(())
    }
}

/// Unified error type for the beacon pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input event. Rejected before entering the queue,
    /// never retried, reported synchronously to the ingest caller.
    #[error("validation failed: {0}")]
    Validation(ValidationReport),

    /// A storage upsert or query failed. Treated as transient: the
    /// owning batch is returned to the queue for retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// Enqueue-side backpressure.
    #[error("queue is full")]
    QueueFull,

    /// The queue has been closed for shutdown.
    #[error("queue is closed")]
    QueueClosed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error with a single violated field.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        let mut report = ValidationReport::new();
        report.push(field, reason);
        Self::Validation(report)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether a failed batch carrying this error should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Internal(_))
    }
}
