//! Error types for local slot storage.

use thiserror::Error;

/// Result type for slot storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by slot store backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage is disabled or otherwise not reachable (e.g. private browsing).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the write because it is full.
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Errors coming from the filesystem.
    #[error("io error while {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
