//! Signaling API for peer discovery.
//!
//! - `/signal?dft_id=<id>` - WebSocket; frames are relayed verbatim to the
//!   other members of the session
//! - `/signal/stats?dft_id=<id>` - current member count of a session

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use drift_signal::{SignalMessage, SignalingHub};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::api::AppState;

const SESSION_REQUIRED: &str = "dft_id is required";

/// Create the signaling routes.
pub fn signal_routes() -> Router<AppState> {
    Router::new()
        .route("/signal", get(signal_handler))
        .route("/signal/stats", get(get_stats))
}

/// Query parameters naming a session.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    dft_id: Option<String>,
}

impl SessionQuery {
    fn session(self) -> Option<String> {
        self.dft_id.filter(|id| !id.is_empty())
    }
}

/// WebSocket upgrade handler.
async fn signal_handler(
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(session) = query.session() else {
        return (StatusCode::BAD_REQUEST, SESSION_REQUIRED).into_response();
    };
    match ws {
        Ok(ws) => ws
            .on_upgrade(move |socket| handle_socket(socket, state.hub.clone(), session))
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

/// Handle a WebSocket connection for one session member.
async fn handle_socket(socket: WebSocket, hub: Arc<SignalingHub>, session: String) {
    let (client, mut receiver) = match hub.join(&session) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to join session: {}", e);
            return;
        }
    };

    let client_id = client.id.clone();
    info!(client_id = %client_id, session = %session, "WebSocket client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Forward queued messages from the hub to the WebSocket.
    let client_id_clone = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = receiver.recv().await {
            if let Err(e) = ws_sender.send(to_ws_message(msg)).await {
                error!(client_id = %client_id_clone, error = %e, "Error sending message");
                break;
            }
        }
        debug!(client_id = %client_id_clone, "Send task ended");
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => {
                debug!(client_id = %client_id, "WebSocket close received");
                break;
            }
            Ok(msg) => {
                if let Some(signal) = from_ws_message(msg) {
                    hub.relay(&session, signal, Some(&client_id));
                }
            }
            Err(e) => {
                error!(client_id = %client_id, error = %e, "Error reading message");
                break;
            }
        }
    }

    send_task.abort();
    hub.leave(&client);
    info!(client_id = %client_id, session = %session, "WebSocket client disconnected");
}

/// Converts an inbound frame into a relayable message. Control frames are
/// not relayed.
fn from_ws_message(msg: Message) -> Option<SignalMessage> {
    match msg {
        Message::Text(text) => Some(SignalMessage::Text(text.to_string())),
        Message::Binary(data) => Some(SignalMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

fn to_ws_message(msg: SignalMessage) -> Message {
    match msg {
        SignalMessage::Text(text) => Message::Text(text.into()),
        SignalMessage::Binary(data) => Message::Binary(data),
    }
}

/// Statistics response.
#[derive(Serialize)]
struct StatsResponse {
    total: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

/// Get the member count of a session.
async fn get_stats(
    Query(query): Query<SessionQuery>,
    State(state): State<AppState>,
) -> Response {
    match query.session() {
        Some(session) => Json(StatsResponse {
            total: state.hub.stats(&session),
        })
        .into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: SESSION_REQUIRED,
            }),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_stats_serialization() {
        let json = serde_json::to_string(&StatsResponse { total: 3 }).unwrap();
        assert_eq!(json, r#"{"total":3}"#);
    }

    #[test]
    fn test_frames_relayed_verbatim() {
        let text = from_ws_message(Message::Text("offer".into())).unwrap();
        assert_eq!(text, SignalMessage::text("offer"));

        let binary = from_ws_message(Message::Binary(Bytes::from_static(b"\x00\xff"))).unwrap();
        assert_eq!(binary, SignalMessage::binary(Bytes::from_static(b"\x00\xff")));

        assert!(matches!(to_ws_message(text), Message::Text(t) if t.as_str() == "offer"));
        assert!(matches!(to_ws_message(binary), Message::Binary(b) if b[..] == b"\x00\xff"[..]));
    }

    #[test]
    fn test_control_frames_not_relayed() {
        assert!(from_ws_message(Message::Ping(Bytes::new())).is_none());
        assert!(from_ws_message(Message::Pong(Bytes::new())).is_none());
    }

    #[test]
    fn test_empty_session_is_missing() {
        let query = SessionQuery {
            dft_id: Some(String::new()),
        };
        assert!(query.session().is_none());
    }
}
