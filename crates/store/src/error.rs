use thiserror::Error;

use crate::JobRunId;

/// Errors that can occur when interacting with the inventory store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The job run was not found.
    #[error("Job run not found: {0}")]
    JobRunNotFound(JobRunId),

    /// A column value that does not fit the model or the table.
    #[error("Invalid value {value:?} in column {column}")]
    InvalidColumn { column: &'static str, value: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
