//! Conversation channel: one live websocket channel per selected peer.
//!
//! SYSTEM CONTEXT
//! ==============
//! `state` is the pure lifecycle table, `transport` is the seam to the
//! network, `manager` drives both from user intents and transport callbacks,
//! and `ws_transport` is the tokio-tungstenite implementation of the seam.

pub mod endpoint;
pub mod manager;
pub mod state;
pub mod transport;
pub mod ws_transport;

use std::fmt;

pub use endpoint::ChatEndpoint;
pub use manager::{ChannelManager, ConnectionStatus, SendPolicy};
pub use state::{ChannelState, ChannelStateMachine, CloseReason, StateError, Trigger};
pub use transport::{ChannelEvent, ChannelId, Transport, TransportError};
pub use ws_transport::WsTransport;

/// Opaque identifier of the conversation counterpart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(String);

impl PeerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
