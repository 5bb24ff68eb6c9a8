//! Error types for the signaling relay.

use thiserror::Error;

/// Errors that can occur in signaling operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    /// No session identifier was supplied.
    #[error("dft_id is required")]
    SessionRequired,

    /// The client's queue is full; the message was dropped.
    #[error("queue full for client {0}")]
    QueueFull(String),

    /// The client's receiver has gone away.
    #[error("channel closed")]
    ClientClosed,
}
