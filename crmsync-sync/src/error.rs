//! Error types for the sync layer.

use crmsync_storage::StorageError;
use crmsync_types::{EntityRef, StrategyKind};
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Which side of a correlation was missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => f.write_str("local"),
            Side::Remote => f.write_str("remote"),
        }
    }
}

/// Errors that can occur in sync operations.
///
/// Everything except [`SyncError::Configuration`] is entity-level: the
/// orchestrator records it in the ledger and moves on to the next entity.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No registered strategy completed for this entity.
    #[error("no applicable strategy for {kind} on {entity}")]
    NoApplicableStrategy { entity: EntityRef, kind: StrategyKind },

    /// No ownership strategy is registered for the entity's type.
    #[error("unsupported model for ownership change: {entity}")]
    UnsupportedModel { entity: EntityRef },

    /// A resolver's key attribute is missing on one side.
    #[error("correlation precondition violated: {resolver} requires '{field}' on the {side} record")]
    CorrelationPrecondition {
        resolver: &'static str,
        field: String,
        side: Side,
    },

    /// Transport-level failure talking to the remote CRM (retryable).
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// A remote call did not finish in time (retryable).
    #[error("operation timed out")]
    Timeout,

    /// Retryable failures persisted past the retry budget.
    #[error("remote call failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The remote CRM refused the request; `message` is its own wording.
    #[error("remote rejected request ({status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// Local validation failed before anything was sent.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Local entity storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Error ledger persistence error.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// No ledger record with this id.
    #[error("sync error record not found: {0}")]
    RecordNotFound(i64),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine is misconfigured; aborts the whole run.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SyncError {
    /// Returns true for failures worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable(_) | SyncError::Timeout)
    }
}
