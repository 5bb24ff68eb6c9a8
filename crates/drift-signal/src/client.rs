//! Session members.

use crate::error::SignalError;
use crate::message::SignalMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unique identifier for a connected client.
pub type ClientId = String;

/// Identifier of a signaling session (`dft_id`).
pub type SessionId = String;

/// A member of a signaling session.
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier.
    pub id: ClientId,
    /// Session the client joined.
    pub session: SessionId,
    /// Bounded queue towards this client's connection.
    sender: mpsc::Sender<SignalMessage>,
    /// When the client joined (Unix timestamp).
    pub connected_at: u64,
}

impl Client {
    /// Create a new client with a message sender.
    pub fn new(id: ClientId, session: SessionId, sender: mpsc::Sender<SignalMessage>) -> Self {
        Self {
            id,
            session,
            sender,
            connected_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Queue a message for this client without waiting.
    pub fn send(&self, message: SignalMessage) -> Result<(), SignalError> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SignalError::QueueFull(self.id.clone()),
            mpsc::error::TrySendError::Closed(_) => SignalError::ClientClosed,
        })
    }

    /// Returns true once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Handle for receiving messages from the hub to send to the connection.
pub type ClientReceiver = mpsc::Receiver<SignalMessage>;

/// Create a new client with its message receiver.
pub fn create_client(
    id: ClientId,
    session: SessionId,
    capacity: usize,
) -> (Arc<Client>, ClientReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let client = Arc::new(Client::new(id, session, sender));
    (client, receiver)
}
