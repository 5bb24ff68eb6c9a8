//! # Drift P2P
//!
//! Peer-to-peer synchronization layer for Drift.
//!
//! A [`PeerHost`] listens for TCP connections from other repository copies
//! and dials them. Every connection carries a single stream that opens
//! with a protocol identifier line:
//!
//! - `/drift/hello/1.0.0` exchanges peer identifiers.
//! - `/drift/object-transfer/1.0.0` carries length-prefixed frames of
//!   compressed objects, terminated by an empty frame, after which the
//!   receiver replies with the number of bytes it persisted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod address;
mod error;
mod host;
mod known;
mod peer;
pub mod protocol;

pub use address::{validate_peer_addr, RepoAddress};
pub use error::{P2pError, Result};
pub use host::{HostConfig, HostState, PeerHost, TransferReport};
pub use known::KnownPeers;
pub use peer::{PeerHandle, PeerId};

/// Default port for Drift peer connections.
pub const DEFAULT_PORT: u16 = 9418;
