//! # Drift Signal
//!
//! Signaling relay that lets Drift peers find each other.
//!
//! Peers join a *session* named by a caller-supplied identifier. Every
//! message a member sends is relayed verbatim to all other members of the
//! same session. The relay never blocks: each member has a bounded queue,
//! and a message for a member whose queue is full is dropped for that
//! member only.
//!
//! ## Example
//!
//! ```rust
//! use drift_signal::{SignalMessage, SignalingHub};
//!
//! let hub = SignalingHub::new();
//! let (alice, _alice_rx) = hub.join("room").unwrap();
//! let (_bob, mut bob_rx) = hub.join("room").unwrap();
//!
//! let outcome = hub.relay("room", SignalMessage::text("offer"), Some(&alice.id));
//! assert_eq!(outcome.delivered, 1);
//! assert_eq!(bob_rx.try_recv().unwrap(), SignalMessage::text("offer"));
//! assert_eq!(hub.stats("room"), 2);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              SignalingHub                │
//! │  Mutex<sessions>                         │
//! │    session_id -> { client_id -> Client } │
//! │                      └─> bounded sender  │
//! └──────────────────────────────────────────┘
//! ```

pub mod client;
pub mod error;
pub mod hub;
pub mod message;

pub use client::{Client, ClientId, ClientReceiver, SessionId};
pub use error::SignalError;
pub use hub::{RelayOutcome, SignalingHub, DEFAULT_QUEUE_CAPACITY};
pub use message::SignalMessage;
