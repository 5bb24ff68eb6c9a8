//! Session registry and relay.

use crate::client::{create_client, Client, ClientId, ClientReceiver, SessionId};
use crate::error::SignalError;
use crate::message::SignalMessage;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Queue capacity per client unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

type Sessions = HashMap<SessionId, HashMap<ClientId, Arc<Client>>>;

/// Result of relaying one message to a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayOutcome {
    /// Members the message was queued for.
    pub delivered: usize,
    /// Members whose queue was full.
    pub dropped: usize,
    /// Members whose connection had already gone away.
    pub closed: usize,
}

/// Registry of signaling sessions.
///
/// All access goes through [`join`](Self::join), [`leave`](Self::leave),
/// [`relay`](Self::relay) and [`stats`](Self::stats); one mutex guards the
/// whole registry.
#[derive(Debug)]
pub struct SignalingHub {
    sessions: Mutex<Sessions>,
    queue_capacity: usize,
}

impl SignalingHub {
    /// Create a hub with the default queue capacity.
    pub fn new() -> Self {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Create a hub whose clients queue at most `capacity` messages.
    pub fn with_queue_capacity(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            queue_capacity: capacity.max(1),
        }
    }

    /// Returns the per-client queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Add a new client to `session`, creating the session if needed.
    pub fn join(&self, session: &str) -> Result<(Arc<Client>, ClientReceiver), SignalError> {
        if session.is_empty() {
            return Err(SignalError::SessionRequired);
        }

        let client_id = uuid::Uuid::new_v4().to_string();
        let (client, receiver) =
            create_client(client_id.clone(), session.to_string(), self.queue_capacity);

        let members = {
            let mut sessions = self.sessions.lock();
            let members = sessions.entry(session.to_string()).or_default();
            members.insert(client_id.clone(), client.clone());
            members.len()
        };

        info!(session = %session, client_id = %client_id, members, "Client joined session");
        Ok((client, receiver))
    }

    /// Remove a client. The session is destroyed when its last member
    /// leaves. Returns false if the client was not registered.
    pub fn leave(&self, client: &Client) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(members) = sessions.get_mut(&client.session) else {
            return false;
        };
        let removed = members.remove(&client.id).is_some();
        let remaining = members.len();
        if remaining == 0 {
            sessions.remove(&client.session);
        }
        drop(sessions);

        if removed {
            info!(
                session = %client.session,
                client_id = %client.id,
                remaining,
                "Client left session"
            );
        }
        removed
    }

    /// Queue `message` for every member of `session` except `exclude`.
    ///
    /// Never blocks. A member whose queue is full misses this message;
    /// the other members are unaffected.
    pub fn relay(
        &self,
        session: &str,
        message: SignalMessage,
        exclude: Option<&ClientId>,
    ) -> RelayOutcome {
        let mut outcome = RelayOutcome::default();
        let sessions = self.sessions.lock();
        let Some(members) = sessions.get(session) else {
            return outcome;
        };

        for client in members.values() {
            if exclude == Some(&client.id) {
                continue;
            }
            match client.send(message.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(SignalError::QueueFull(_)) => {
                    outcome.dropped += 1;
                    warn!(
                        session = %session,
                        client_id = %client.id,
                        "Client queue full, dropping message"
                    );
                }
                Err(_) => outcome.closed += 1,
            }
        }
        drop(sessions);

        debug!(
            session = %session,
            bytes = message.len(),
            delivered = outcome.delivered,
            dropped = outcome.dropped,
            "Relayed message"
        );
        outcome
    }

    /// Number of members in `session`; zero if it does not exist.
    pub fn stats(&self, session: &str) -> usize {
        self.sessions.lock().get(session).map_or(0, HashMap::len)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Number of clients across all sessions.
    pub fn client_count(&self) -> usize {
        self.sessions.lock().values().map(HashMap::len).sum()
    }
}

impl Default for SignalingHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_session() {
        let hub = SignalingHub::new();
        assert_eq!(hub.stats("s"), 0);

        let (client, _rx) = hub.join("s").unwrap();
        assert_eq!(client.session, "s");
        assert_eq!(hub.stats("s"), 1);
        assert_eq!(hub.session_count(), 1);
    }

    #[test]
    fn test_join_requires_session() {
        let hub = SignalingHub::new();
        assert!(matches!(hub.join(""), Err(SignalError::SessionRequired)));
        assert_eq!(hub.session_count(), 0);
    }

    #[test]
    fn test_fan_out_without_echo() {
        let hub = SignalingHub::new();
        let (c1, mut rx1) = hub.join("S").unwrap();
        let (_c2, mut rx2) = hub.join("S").unwrap();
        let (_c3, mut rx3) = hub.join("S").unwrap();

        let msg = SignalMessage::text("candidate");
        let outcome = hub.relay("S", msg.clone(), Some(&c1.id));

        assert_eq!(outcome.delivered, 2);
        assert_eq!(rx2.try_recv().unwrap(), msg);
        assert_eq!(rx3.try_recv().unwrap(), msg);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_only_affects_that_member() {
        let hub = SignalingHub::with_queue_capacity(1);
        let (c1, _rx1) = hub.join("S").unwrap();
        let (c2, mut rx2) = hub.join("S").unwrap();
        let (_c3, mut rx3) = hub.join("S").unwrap();

        // Fill client 2's queue.
        c2.send(SignalMessage::text("backlog")).unwrap();

        let msg = SignalMessage::binary(&b"\x01\x02"[..]);
        let outcome = hub.relay("S", msg.clone(), Some(&c1.id));

        assert_eq!(outcome.delivered, 1);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(rx3.try_recv().unwrap(), msg);
        assert_eq!(rx2.try_recv().unwrap(), SignalMessage::text("backlog"));
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn test_closed_member_is_skipped() {
        let hub = SignalingHub::new();
        let (_c1, rx1) = hub.join("S").unwrap();
        let (_c2, mut rx2) = hub.join("S").unwrap();
        drop(rx1);

        let outcome = hub.relay("S", SignalMessage::text("x"), None);
        assert_eq!(outcome.closed, 1);
        assert_eq!(outcome.delivered, 1);
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let hub = SignalingHub::new();
        let (a, _rxa) = hub.join("A").unwrap();
        let (_b, mut rxb) = hub.join("B").unwrap();

        let outcome = hub.relay("A", SignalMessage::text("x"), Some(&a.id));
        assert_eq!(outcome, RelayOutcome::default());
        assert!(rxb.try_recv().is_err());
    }

    #[test]
    fn test_relay_to_unknown_session() {
        let hub = SignalingHub::new();
        let outcome = hub.relay("missing", SignalMessage::text("x"), None);
        assert_eq!(outcome, RelayOutcome::default());
    }

    #[test]
    fn test_last_leave_tears_down_session() {
        let hub = SignalingHub::new();
        let (c1, _rx1) = hub.join("S").unwrap();
        let (c2, _rx2) = hub.join("S").unwrap();

        assert!(hub.leave(&c1));
        assert_eq!(hub.stats("S"), 1);
        assert_eq!(hub.session_count(), 1);

        assert!(hub.leave(&c2));
        assert_eq!(hub.stats("S"), 0);
        assert_eq!(hub.session_count(), 0);
        assert_eq!(hub.client_count(), 0);

        assert!(!hub.leave(&c2));
    }

    #[tokio::test]
    async fn test_concurrent_joins_and_leaves() {
        let hub = Arc::new(SignalingHub::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let hub = hub.clone();
            handles.push(tokio::spawn(async move {
                let session = format!("s{}", i % 4);
                let (client, _rx) = hub.join(&session).unwrap();
                hub.relay(&session, SignalMessage::text("ping"), Some(&client.id));
                tokio::task::yield_now().await;
                assert!(hub.leave(&client));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(hub.session_count(), 0);
    }
}
