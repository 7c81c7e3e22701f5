//! Error taxonomy for gitdb
//!
//! Every failure surfaced by the engine maps onto one `DbError` variant with a
//! stable code. Codes follow the `GITDB_<CATEGORY>` format.
//!
//! Propagation rules:
//! - Validation and id parsing errors are returned before any side effect
//! - Bad blocks and bad records are isolated to the smallest affected unit
//! - Commit failures never undo a block file that is already on disk

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for gitdb operations
pub type DbResult<T> = Result<T, DbError>;

/// gitdb errors
#[derive(Debug, Error)]
pub enum DbError {
    /// Model failed validation; nothing was written
    #[error("Model is not valid: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    /// Block file exists but is not a valid id -> payload mapping
    #[error("Bad block {}: {reason}", path.display())]
    BadBlock { path: PathBuf, reason: String },

    /// A single record inside an otherwise readable block
    #[error("Bad record {id}: {reason}")]
    BadRecord { id: String, reason: String },

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),

    #[error("{field} index does not exist in dataset {dataset}")]
    IndexNotFound { dataset: String, field: String },

    #[error("Too many models: {count} (max: {max})")]
    TooManyModels { count: usize, max: usize },

    /// The block file is written but the commit backend rejected the change
    #[error("Commit failed (data is on disk but not versioned): {0}")]
    CommitFailed(String),

    /// The block file is written but the commit was not acknowledged in time
    #[error("Commit not acknowledged after {waited_ms}ms (data is on disk but not yet versioned)")]
    CommitTimeout { waited_ms: u64 },

    /// A batch stopped at its first failure; earlier writes stay in place
    #[error("Batch stopped after {} writes: {source}", completed.len())]
    PartialBatch {
        completed: Vec<String>,
        #[source]
        source: Box<DbError>,
    },

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Connection is closed")]
    ConnectionClosed,
}

impl DbError {
    /// Wrap an I/O error with the operation and path it came from
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        DbError::Io {
            context: context.into(),
            source,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DbError::Validation(_) => "GITDB_VALIDATION_ERROR",
            DbError::InvalidRecordId(_) => "GITDB_INVALID_RECORD_ID",
            DbError::BadBlock { .. } => "GITDB_BAD_BLOCK",
            DbError::BadRecord { .. } => "GITDB_BAD_RECORD",
            DbError::RecordNotFound(_) => "GITDB_RECORD_NOT_FOUND",
            DbError::DatasetNotFound(_) => "GITDB_DATASET_NOT_FOUND",
            DbError::IndexNotFound { .. } => "GITDB_INDEX_NOT_FOUND",
            DbError::TooManyModels { .. } => "GITDB_TOO_MANY_MODELS",
            DbError::CommitFailed(_) => "GITDB_COMMIT_FAILED",
            DbError::CommitTimeout { .. } => "GITDB_COMMIT_TIMEOUT",
            DbError::PartialBatch { .. } => "GITDB_PARTIAL_BATCH",
            DbError::Encryption(_) => "GITDB_ENCRYPTION_ERROR",
            DbError::Serialization(_) => "GITDB_SERIALIZATION_ERROR",
            DbError::Io { .. } => "GITDB_IO_ERROR",
            DbError::Config(_) => "GITDB_CONFIG_ERROR",
            DbError::ConnectionClosed => "GITDB_CONNECTION_CLOSED",
        }
    }

    /// True when the write reached disk but its commit is not guaranteed.
    ///
    /// Callers should treat these as warnings: retrying the write is safe
    /// (it resolves to the same id) but not required for local durability.
    pub fn is_durability_warning(&self) -> bool {
        matches!(self, DbError::CommitFailed(_) | DbError::CommitTimeout { .. })
    }

    /// True for errors that describe the absence of a record
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::RecordNotFound(_))
    }
}
