//! Client core for per-peer realtime chat.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` holds the credential context, `net` talks to the REST
//! collaborator, `directory` derives the chat peers from accepted
//! connections, `store` is the ordered message log of the active
//! conversation, and `channel` owns the single live websocket channel.
//! `runtime` glues the channel manager to the websocket transport's event
//! queue for presentation layers.

pub mod channel;
pub mod config;
pub mod directory;
pub mod error;
pub mod net;
pub mod runtime;
pub mod session;
pub mod store;

pub use channel::{
    ChannelEvent, ChannelId, ChannelManager, ChannelState, ChatEndpoint, CloseReason, ConnectionStatus, PeerId,
    SendPolicy, Transport, TransportError, WsTransport,
};
pub use config::ClientConfig;
pub use directory::{Directory, Peer};
pub use error::ChatError;
pub use runtime::ChatRuntime;
pub use session::{CredentialContext, Identity, Session};
pub use store::{ChatMessage, Delivery, MessageStore};
