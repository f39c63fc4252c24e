//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity not found.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// Another writer changed the entity since it was read.
    #[error("version conflict on {entity}: expected version {expected}")]
    Conflict { entity: String, expected: i64 },

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// The connection mutex was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,
}
