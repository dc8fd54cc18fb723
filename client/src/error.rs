//! Error taxonomy surfaced by the channel manager.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures never reach callers as errors from the event path; they
//! move the channel to `Closed(Error)` and show up as a disconnected status.
//! The variants here are returned only from user intents (`select_peer`,
//! `send`) and from REST calls.

use crate::channel::TransportError;
use crate::net::api::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// No session token is available; nothing was attempted.
    #[error("not authenticated")]
    AuthMissing,
    /// `send` was called while no channel is open. The message is not queued.
    #[error("no open chat channel")]
    ChannelUnavailable,
    /// `send` was called with empty or whitespace-only text. Nothing was framed.
    #[error("message is empty")]
    EmptyMessage,
    /// The configured base URL has no `http(s)` or `ws(s)` scheme.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] frames::CodecError),
    #[error(transparent)]
    Api(#[from] ApiError),
}
