//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        /// The operation that failed, e.g. "create directory".
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The requested object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The object data is malformed.
    #[error("invalid object: {0}")]
    InvalidObject(String),

    /// The stored bytes do not match the object's identity.
    #[error("corrupt object {id}: {reason}")]
    Corruption {
        /// Hex digest of the object that failed verification.
        id: String,
        /// What did not match.
        reason: String,
    },

    /// A reference name or reference file is malformed.
    #[error("invalid ref: {0}")]
    InvalidRef(String),

    /// The requested reference does not exist.
    #[error("ref not found: {0}")]
    RefNotFound(String),
}

impl StorageError {
    /// Returns a closure wrapping an I/O error with the operation and path.
    pub(crate) fn io(
        op: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }
}
