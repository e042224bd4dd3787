//! Pipeline error types.

use store::StoreError;
use thiserror::Error;

/// Errors that can occur while running a pipeline stage.
///
/// Data-shape gaps (no active spec, a single snapshot, no history) are not
/// errors; they shrink a stage's output instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A storage or query error inside a stage.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The trigger parameters are unusable (e.g. `from` after `to`).
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    /// A policy constant is out of range.
    #[error("Invalid pipeline config: {0}")]
    InvalidConfig(String),

    /// Failed to serialize trigger parameters for the job run.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
