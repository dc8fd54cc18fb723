//! Shared frame model and JSON codec for the per-peer chat channel.
//!
//! This crate owns the wire representation used by both `chat_client` and
//! `chat-relay`. Every frame is a single websocket text message carrying one
//! JSON object.
//!
//! DESIGN
//! ======
//! Inbound frames are decoded into the [`InboundFrame`] tagged union at the
//! transport boundary. The `type` key is the discriminator: absent means a
//! chat message, `websocket_connected` means a connection acknowledgement,
//! and anything else is rejected as [`CodecError::UnknownType`].
//!
//! Identifiers arrive either as JSON strings or as integers depending on the
//! producer; both are normalised to their string form by [`id_text`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `type` discriminator of the connection acknowledgement envelope.
pub const CONNECTED_TYPE: &str = "websocket_connected";

/// `type` discriminator the relay uses for fan-out events. Treated as a chat
/// message when it reaches a client.
pub const CHAT_MESSAGE_TYPE: &str = "chat_message";

/// Error returned by the decode functions. Callers treat every variant as a
/// malformed frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload is not valid JSON.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    /// The payload is valid JSON but not an object.
    #[error("frame payload is not a JSON object")]
    NotAnObject,
    /// A field required by the frame shape is absent or has the wrong type.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    /// The `type` discriminator is present but not recognized.
    #[error("unrecognized frame type `{0}`")]
    UnknownType(String),
}

/// Connection acknowledgement sent by the relay right after the upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connected {
    /// Room the channel was joined to, e.g. `"chat_1_42"`.
    pub room: String,
    /// Authenticated user id as resolved by the relay, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// A chat message carried by the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatFrame {
    /// Sender reference (user id or email, depending on the producer).
    pub sender: String,
    /// Message body.
    pub message: String,
    /// Receiver reference, when the producer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
}

/// Every frame shape a client can receive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    /// Informational acknowledgement; never a chat message.
    Connected(Connected),
    /// A chat message to append to the conversation.
    Chat(ChatFrame),
}

/// Frame a client sends for each chat message.
///
/// Field order matches the wire contract: `receiver`, `message`, `sender`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Peer the message is addressed to.
    pub receiver: String,
    /// Message body.
    pub message: String,
    /// Email of the sending identity.
    pub sender: String,
}

/// Frame as seen by the relay when a client sends it.
///
/// Only `message` and `receiver` are required; the relay stamps the
/// authenticated sender itself and ignores any client-supplied one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientFrame {
    pub receiver: String,
    pub message: String,
    pub sender: Option<String>,
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns a [`CodecError`] when the text is not a JSON object, when the
/// `type` discriminator is unknown, or when a required field is missing.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    let Value::Object(map) = value else {
        return Err(CodecError::NotAnObject);
    };

    match map.get("type") {
        None => decode_chat(&map).map(InboundFrame::Chat),
        Some(Value::String(kind)) if kind == CONNECTED_TYPE => {
            decode_connected(&map).map(InboundFrame::Connected)
        }
        Some(Value::String(kind)) if kind == CHAT_MESSAGE_TYPE => {
            decode_chat(&map).map(InboundFrame::Chat)
        }
        Some(Value::String(kind)) => Err(CodecError::UnknownType(kind.clone())),
        Some(other) => Err(CodecError::UnknownType(other.to_string())),
    }
}

/// Decode a frame sent by a client to the relay.
///
/// # Errors
///
/// Returns a [`CodecError`] when the payload is not an object or when
/// `message` or `receiver` is missing or empty.
pub fn decode_client_frame(text: &str) -> Result<ClientFrame, CodecError> {
    let value = serde_json::from_str::<Value>(text)?;
    let Value::Object(map) = value else {
        return Err(CodecError::NotAnObject);
    };

    let message = map
        .get("message")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
        .ok_or(CodecError::MissingField("message"))?
        .to_owned();
    let receiver = map
        .get("receiver")
        .and_then(id_text)
        .ok_or(CodecError::MissingField("receiver"))?;
    let sender = map.get("sender").and_then(id_text);

    Ok(ClientFrame { receiver, message, sender })
}

/// Encode an outbound chat frame as JSON text.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Encode a connection acknowledgement with its `type` discriminator.
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_connected(ack: &Connected) -> Result<String, CodecError> {
    let mut map = Map::new();
    map.insert("type".to_owned(), Value::String(CONNECTED_TYPE.to_owned()));
    map.insert("room".to_owned(), Value::String(ack.room.clone()));
    if let Some(user_id) = &ack.user_id {
        map.insert("user_id".to_owned(), Value::String(user_id.clone()));
    }
    Ok(serde_json::to_string(&Value::Object(map))?)
}

/// Encode a chat message as broadcast by the relay (no discriminator).
///
/// # Errors
///
/// Returns [`CodecError::Json`] if serialization fails.
pub fn encode_chat(frame: &ChatFrame) -> Result<String, CodecError> {
    Ok(serde_json::to_string(frame)?)
}

/// Room shared by exactly two users.
///
/// The pair is ordered so both sides compute the same name: numerically when
/// both ids are integers, lexically otherwise.
#[must_use]
pub fn room_name(user_a: &str, user_b: &str) -> String {
    let (low, high) = match (user_a.parse::<i64>(), user_b.parse::<i64>()) {
        (Ok(a), Ok(b)) => {
            if a <= b {
                (a.to_string(), b.to_string())
            } else {
                (b.to_string(), a.to_string())
            }
        }
        _ if user_a <= user_b => (user_a.to_owned(), user_b.to_owned()),
        _ => (user_b.to_owned(), user_a.to_owned()),
    };
    format!("chat_{low}_{high}")
}

/// String form of an identifier that may be encoded as a JSON string or
/// integer. Empty strings, floats, and other kinds yield `None`.
#[must_use]
pub fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        _ => None,
    }
}

fn decode_chat(map: &Map<String, Value>) -> Result<ChatFrame, CodecError> {
    let sender = map
        .get("sender")
        .and_then(id_text)
        .ok_or(CodecError::MissingField("sender"))?;
    let message = map
        .get("message")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingField("message"))?
        .to_owned();
    let receiver = map.get("receiver").and_then(id_text);

    Ok(ChatFrame { sender, message, receiver })
}

fn decode_connected(map: &Map<String, Value>) -> Result<Connected, CodecError> {
    let room = map
        .get("room")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingField("room"))?
        .to_owned();
    let user_id = map.get("user_id").and_then(id_text);

    Ok(Connected { room, user_id })
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
