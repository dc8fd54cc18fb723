//! Seam between the channel manager and the network.
//!
//! A transport opens, writes to, and closes channels identified by
//! [`ChannelId`]. It reports everything that happens on a channel as
//! [`ChannelEvent`]s tagged with that id, and the manager feeds those into
//! [`super::ChannelManager::dispatch`]. Implementations must stop reporting
//! events for a channel once `close` has been called for it, and must close
//! a socket whose handshake completes after `close`.

use std::fmt;

/// Identity of one channel instance. Never reused within a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Callback from the transport for one channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Opened,
    /// One inbound text frame, in receipt order.
    Frame(String),
    /// Connect or runtime failure, including a connect timeout.
    Failed(String),
    /// The remote end closed the channel.
    Closed { code: Option<u16>, reason: String },
}

impl ChannelEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opened => "opened",
            Self::Frame(_) => "frame",
            Self::Failed(_) => "failed",
            Self::Closed { .. } => "closed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket connect failed: {0}")]
    Connect(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("timed out connecting")]
    Timeout,
    #[error("channel closed")]
    Closed,
    #[error("unknown channel {0}")]
    UnknownChannel(ChannelId),
}

pub trait Transport {
    /// Start opening a channel to `url`. Completion or failure is reported
    /// later as an event.
    fn open(&mut self, channel: ChannelId, url: &str);

    /// Queue one text frame on an open channel.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the channel is unknown or already gone.
    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), TransportError>;

    /// Close a channel and discard anything queued on it. Idempotent.
    fn close(&mut self, channel: ChannelId);
}
