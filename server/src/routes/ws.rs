//! WebSocket handler: two-party chat relay.
//!
//! DESIGN
//! ======
//! On upgrade, the connection joins the room shared by the authenticated user
//! and the recipient, then enters a `select!` loop:
//! - Incoming client frames -> validate -> broadcast to the room
//! - Broadcast frames from the room -> forward to client
//!
//! The sender receives its own broadcast like every other member; clients
//! rely on that echo to confirm delivery.
//!
//! LIFECYCLE
//! =========
//! 1. Query carries `token` and `recipient`; a missing or unknown token is
//!    rejected with 401 before the upgrade
//! 2. Upgrade -> join room -> send `websocket_connected` acknowledgement
//! 3. Client sends `{ message, receiver }` -> broadcast `{ message, sender }`
//! 4. Close -> part room

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frames::{ChatFrame, Connected};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::RelayState;

#[cfg(test)]
#[path = "ws_test.rs"]
mod ws_test;

const ROOM_QUEUE_CAPACITY: usize = 256;

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_chat_ws(
    State(state): State<RelayState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let token = params.get("token").filter(|t| !t.is_empty());
    let recipient = params.get("recipient").filter(|r| !r.is_empty());
    let (Some(token), Some(recipient)) = (token, recipient) else {
        warn!("ws: missing token or recipient");
        return (StatusCode::UNAUTHORIZED, "token and recipient required").into_response();
    };

    let Some(user_id) = state.resolve_token(token).map(ToOwned::to_owned) else {
        warn!("ws: unknown token");
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    };

    let recipient = recipient.clone();
    ws.on_upgrade(move |socket| run_chat(socket, state, user_id, recipient))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_chat(mut socket: WebSocket, state: RelayState, user_id: String, recipient: String) {
    let connection = Uuid::new_v4();
    let room = frames::room_name(&user_id, &recipient);

    let (room_tx, mut room_rx) = mpsc::channel::<String>(ROOM_QUEUE_CAPACITY);
    state.join(&room, connection, room_tx).await;

    let ack = Connected { room: room.clone(), user_id: Some(user_id.clone()) };
    match frames::encode_connected(&ack) {
        Ok(text) => {
            if socket.send(Message::Text(text.into())).await.is_err() {
                state.part(&room, connection).await;
                return;
            }
        }
        Err(e) => warn!(error = %e, "ws: failed to encode acknowledgement"),
    }

    info!(%connection, %user_id, %room, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        process_inbound_text(&state, &room, &user_id, text.as_str()).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(text) = room_rx.recv() => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.part(&room, connection).await;
    info!(%connection, %room, "ws: client disconnected");
}

// =============================================================================
// FRAME HANDLING
// =============================================================================

/// Validate one inbound text frame and broadcast it to the room.
///
/// The broadcast carries the authenticated user id as `sender`; any sender
/// the client supplied is ignored. Returns the number of members reached, or
/// `None` when the frame was rejected.
pub(crate) async fn process_inbound_text(state: &RelayState, room: &str, user_id: &str, text: &str) -> Option<usize> {
    let frame = match frames::decode_client_frame(text) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(%room, error = %e, "ws: invalid message payload");
            return None;
        }
    };

    let outbound = ChatFrame { sender: user_id.to_owned(), message: frame.message, receiver: None };
    let encoded = match frames::encode_chat(&outbound) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!(%room, error = %e, "ws: failed to encode chat frame");
            return None;
        }
    };

    let reached = state.broadcast(room, &encoded).await;
    debug!(%room, receiver = %frame.receiver, reached, "ws: relayed message");
    Some(reached)
}
