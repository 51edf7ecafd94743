//! Storage-specific error types.
//!
//! All storage operations return [`StorageError`] on failure. The collector
//! treats every variant as a persistence failure scoped to the row being
//! written, except where a caller escalates it (database handle, selector).

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database operation failed (sqlx error).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid data in database (e.g., negative counter, unparseable value).
    #[error("invalid data: {0}")]
    InvalidData(String),
}
