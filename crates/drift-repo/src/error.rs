//! Repository error types.

use drift_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A marker directory already exists where `init` was run.
    #[error("Drift repository already exists in {}", .0.display())]
    AlreadyInitialized(PathBuf),

    /// No marker directory was found walking up from the start directory.
    #[error("fatal: not a Drift repository (or any of the parent directories): {}", .0.display())]
    NotARepository(PathBuf),

    /// The marker exists but the objects directory is gone.
    #[error("fatal: missing objects directory: {}", .0.display())]
    MissingObjectsDir(PathBuf),

    /// The index has no entries.
    #[error("nothing to commit")]
    NothingToCommit,

    /// The path given to `add` does not exist.
    #[error("file or directory does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    /// The path given to `add` lies outside the repository root.
    #[error("path is outside the repository: {}", .0.display())]
    OutsideRepository(PathBuf),

    /// The configuration key is not recognized.
    #[error("unsupported config key: {0}")]
    UnsupportedConfigKey(String),

    /// The configuration key cannot be changed.
    #[error("config key is read-only: {0}")]
    ReadOnlyConfigKey(String),

    /// The configuration file could not be parsed or serialized.
    #[error("invalid config: {0}")]
    Config(String),

    /// A filesystem operation failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        /// The operation that failed.
        op: &'static str,
        /// The path the operation was applied to.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An object store or ref operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A background task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl RepoError {
    /// Returns a closure wrapping an I/O error with the operation and path.
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { op, path, source }
    }
}

/// A specialized Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;
