use std::io;
use std::path::PathBuf;

/// Errors produced by the store, the process log and the operation handlers.
///
/// Only storage failures (`Io`, `Json`, `Csv`, `Locked`) escape an operation
/// handler as `Err`. The domain conditions are recorded per target in the
/// handler's [`Report`](crate::Report) so one bad row or document never
/// aborts a batch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Criteria matched no document, or a `log_id` is absent from a log.
    #[error("not found: {0}")]
    NotFound(String),

    /// The dot path does not resolve in the document.
    #[error("field '{path}' does not exist")]
    FieldAbsent { path: String },

    /// The targeted log entry was not written by an update or a restore.
    #[error("log entry '{log_id}' has operation '{operation}', only update and restore entries can be restored")]
    NotRestorable { log_id: String, operation: String },

    /// Malformed input row, document or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Another process holds the collection lock.
    #[error("another process holds the lock on {}", path.display())]
    Locked { path: PathBuf },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Whether the error concerns a single target (document, row or field)
    /// rather than the storage itself.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::FieldAbsent { .. }
                | Error::NotRestorable { .. }
                | Error::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
