//! P2P error types.

use drift_storage::StorageError;
use thiserror::Error;

/// Errors that can occur during P2P operations.
#[derive(Debug, Error)]
pub enum P2pError {
    /// A repository or peer address is malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Dialing or handshaking with a peer failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// An object transfer stream failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The remote side violated the wire protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The host is not listening.
    #[error("host not listening")]
    NotListening,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reading or persisting an object failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A blocking store task panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A specialized Result type for P2P operations.
pub type Result<T> = std::result::Result<T, P2pError>;
