//! Conversation channel manager.
//!
//! DESIGN
//! ======
//! The manager owns at most one live channel, bound to the selected peer.
//! Everything that changes it arrives through two doors:
//! - user intents: [`ChannelManager::select_peer`], [`ChannelManager::send`],
//!   [`ChannelManager::shutdown`]
//! - transport callbacks: [`ChannelManager::dispatch`]
//!
//! Both run on the caller's task and are never interleaved mid-call, so the
//! manager needs no locking. Every transport callback carries the
//! [`ChannelId`] it belongs to; callbacks for any channel other than the
//! current live one are dropped, which is what keeps a superseded channel
//! from writing into the next conversation's store.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures close the channel with `Closed(Error)` and leave the
//! store untouched. Malformed frames are logged and dropped. Neither ever
//! surfaces as an `Err` to the presentation layer; they show up through
//! [`ChannelManager::status`].

#[cfg(test)]
#[path = "manager_test.rs"]
mod manager_test;

use frames::{ChatFrame, InboundFrame, OutboundFrame};
use tracing::{debug, info, warn};

use super::endpoint::ChatEndpoint;
use super::state::{ChannelState, ChannelStateMachine, CloseReason, Trigger};
use super::transport::{ChannelEvent, ChannelId, Transport, TransportError};
use super::PeerId;
use crate::error::ChatError;
use crate::session::CredentialContext;
use crate::store::{ChatMessage, MessageStore};

/// What happens to the store when the user sends a message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendPolicy {
    /// Append immediately as `Pending` and reconcile with the relay's echo.
    #[default]
    Optimistic,
    /// Append nothing locally; the store grows only from inbound frames.
    EchoOnly,
}

/// Connection status shown to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    NotAuthenticated,
    /// No conversation selected.
    Idle,
    Connecting,
    Connected,
    /// The last channel failed or was closed by the remote end.
    Disconnected,
}

#[derive(Debug)]
struct ChannelSlot {
    id: ChannelId,
    peer: PeerId,
    state: ChannelState,
}

impl ChannelSlot {
    fn advance(&mut self, trigger: Trigger) {
        match ChannelStateMachine::transition(&self.state, trigger) {
            Ok(next) => {
                debug!(channel = %self.id, peer = %self.peer, from = %self.state, to = %next, "channel transition");
                self.state = next;
            }
            Err(e) => warn!(channel = %self.id, error = %e, "ignoring illegal channel transition"),
        }
    }

    fn is_live(&self) -> bool {
        !self.state.is_closed()
    }
}

pub struct ChannelManager<T: Transport> {
    context: CredentialContext,
    endpoint: ChatEndpoint,
    transport: T,
    policy: SendPolicy,
    selected: Option<PeerId>,
    channel: Option<ChannelSlot>,
    store: MessageStore,
    /// User id reported by the relay's connection acknowledgement.
    relay_user_id: Option<String>,
    next_channel: u64,
    next_seq: u64,
}

impl<T: Transport> ChannelManager<T> {
    #[must_use]
    pub fn new(context: CredentialContext, endpoint: ChatEndpoint, transport: T, policy: SendPolicy) -> Self {
        Self {
            context,
            endpoint,
            transport,
            policy,
            selected: None,
            channel: None,
            store: MessageStore::new(),
            relay_user_id: None,
            next_channel: 0,
            next_seq: 0,
        }
    }

    /// Select the active conversation, or clear it with `None`.
    ///
    /// Re-selecting the peer whose channel is already open is a no-op. Any
    /// other call closes the current channel (discarding its unsent frames),
    /// clears the store, and opens a fresh channel to `peer`. Re-selecting a
    /// peer after a failure is how a reconnect is requested.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AuthMissing`] without touching the transport when
    /// the credential context has no token.
    pub fn select_peer(&mut self, peer: Option<PeerId>) -> Result<(), ChatError> {
        let Some(peer) = peer else {
            self.selected = None;
            self.close_current(CloseReason::UserInitiated);
            self.store.reset(None);
            return Ok(());
        };

        if self.is_open_for(&peer) {
            debug!(peer = %peer, "peer already open; keeping channel");
            return Ok(());
        }

        let Some(token) = self.context.token().map(ToOwned::to_owned) else {
            warn!(peer = %peer, "no session token; not opening channel");
            return Err(ChatError::AuthMissing);
        };

        self.close_current(CloseReason::Superseded);

        self.next_channel += 1;
        let id = ChannelId(self.next_channel);
        let mut slot = ChannelSlot { id, peer: peer.clone(), state: ChannelState::Idle };
        slot.advance(Trigger::Connect);

        self.store.reset(Some(peer.clone()));
        self.selected = Some(peer.clone());
        self.channel = Some(slot);
        self.relay_user_id = None;

        info!(channel = %id, peer = %peer, "opening chat channel");
        let url = self.endpoint.channel_url(&token, &peer);
        self.transport.open(id, &url);
        Ok(())
    }

    /// Frame `text` and send it to the active peer.
    ///
    /// Returns the client sequence number assigned to the message.
    ///
    /// # Errors
    ///
    /// - [`ChatError::EmptyMessage`] for empty or whitespace-only text
    /// - [`ChatError::ChannelUnavailable`] when no channel is open, including
    ///   a socket that died before its failure event was dispatched
    /// - [`ChatError::Transport`] for any other transport refusal
    pub fn send(&mut self, text: &str) -> Result<u64, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let Some(slot) = self.channel.as_ref().filter(|s| s.state == ChannelState::Open) else {
            return Err(ChatError::ChannelUnavailable);
        };
        let Some(sender) = self.context.email().map(ToOwned::to_owned) else {
            return Err(ChatError::AuthMissing);
        };

        let frame = OutboundFrame {
            receiver: slot.peer.to_string(),
            message: text.to_owned(),
            sender: sender.clone(),
        };
        let encoded = frames::encode_outbound(&frame)?;
        if let Err(error) = self.transport.send(slot.id, encoded) {
            warn!(channel = %slot.id, %error, "transport refused chat frame");
            return Err(match error {
                TransportError::Closed | TransportError::UnknownChannel(_) => ChatError::ChannelUnavailable,
                other => other.into(),
            });
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        debug!(channel = %slot.id, seq, "sent chat frame");

        if self.policy == SendPolicy::Optimistic {
            self.store.append(ChatMessage::pending(sender, frame.receiver, frame.message, seq));
        }
        Ok(seq)
    }

    /// Apply one transport callback.
    ///
    /// Callbacks for channels other than the current live one are dropped. A
    /// late handshake on such a channel is answered with another `close`.
    pub fn dispatch(&mut self, channel: ChannelId, event: ChannelEvent) {
        let Some(slot) = self.channel.as_mut().filter(|s| s.id == channel && s.is_live()) else {
            if event == ChannelEvent::Opened {
                self.transport.close(channel);
            }
            debug!(%channel, event = event.kind(), "dropping callback for stale channel");
            return;
        };

        match event {
            ChannelEvent::Opened => {
                slot.advance(Trigger::Handshake);
                if slot.state == ChannelState::Open {
                    info!(%channel, peer = %slot.peer, "chat channel open");
                    let peer = slot.peer.clone();
                    self.store.reset(Some(peer));
                }
            }
            ChannelEvent::Frame(raw) => self.on_inbound_frame(channel, &raw),
            ChannelEvent::Failed(reason) => {
                warn!(%channel, peer = %slot.peer, %reason, "chat channel failed");
                slot.advance(Trigger::Failure(reason));
            }
            ChannelEvent::Closed { code, reason } => {
                warn!(%channel, peer = %slot.peer, ?code, %reason, "chat channel closed by remote");
                let reason = match code {
                    Some(code) => format!("remote closed ({code}) {reason}"),
                    None => format!("remote closed {reason}"),
                };
                slot.advance(Trigger::Failure(reason.trim_end().to_owned()));
            }
        }
    }

    /// Parse one inbound frame and append chat messages to the store.
    ///
    /// Frames for any channel but the open current one are dropped, as are
    /// malformed frames. Neither affects the channel state.
    pub fn on_inbound_frame(&mut self, channel: ChannelId, raw: &str) {
        let Some(slot) = self
            .channel
            .as_ref()
            .filter(|s| s.id == channel && s.state == ChannelState::Open)
        else {
            debug!(%channel, "dropping frame for channel that is not open");
            return;
        };
        if self.store.peer() != Some(&slot.peer) {
            debug!(%channel, "dropping frame for a different conversation");
            return;
        }

        match frames::decode_inbound(raw) {
            Ok(InboundFrame::Connected(ack)) => {
                info!(%channel, room = %ack.room, "chat channel acknowledged");
                self.relay_user_id = ack.user_id;
            }
            Ok(InboundFrame::Chat(chat)) => self.accept_chat(chat),
            Err(error) => warn!(%channel, %error, "dropping malformed frame"),
        }
    }

    /// Close the live channel, if any, and forget the selection.
    pub fn shutdown(&mut self) {
        self.selected = None;
        self.close_current(CloseReason::UserInitiated);
    }

    /// State of the current channel, or `Idle` when none was ever opened.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.channel
            .as_ref()
            .map_or(ChannelState::Idle, |slot| slot.state.clone())
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        if self.context.token().is_none() {
            return ConnectionStatus::NotAuthenticated;
        }
        if self.selected.is_none() {
            return ConnectionStatus::Idle;
        }
        match self.channel.as_ref().map(|slot| &slot.state) {
            None | Some(ChannelState::Closed(CloseReason::UserInitiated | CloseReason::Superseded)) => {
                ConnectionStatus::Idle
            }
            Some(ChannelState::Idle | ChannelState::Connecting) => ConnectionStatus::Connecting,
            Some(ChannelState::Open) => ConnectionStatus::Connected,
            Some(ChannelState::Closing | ChannelState::Closed(CloseReason::Error(_))) => {
                ConnectionStatus::Disconnected
            }
        }
    }

    #[must_use]
    pub fn active_peer(&self) -> Option<&PeerId> {
        self.selected.as_ref()
    }

    /// Id of the current channel, live or not.
    #[must_use]
    pub fn active_channel(&self) -> Option<ChannelId> {
        self.channel.as_ref().map(|slot| slot.id)
    }

    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// User id the relay acknowledged the current channel with, once seen.
    #[must_use]
    pub fn relay_user_id(&self) -> Option<&str> {
        self.relay_user_id.as_deref()
    }

    #[must_use]
    pub fn policy(&self) -> SendPolicy {
        self.policy
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn is_open_for(&self, peer: &PeerId) -> bool {
        self.channel
            .as_ref()
            .is_some_and(|slot| &slot.peer == peer && slot.state == ChannelState::Open)
    }

    fn is_me(&self, sender: &str) -> bool {
        self.context.is_me(sender) || self.relay_user_id.as_deref() == Some(sender)
    }

    fn accept_chat(&mut self, chat: ChatFrame) {
        if self.policy == SendPolicy::Optimistic && self.is_me(&chat.sender) && self.store.confirm_echo(&chat.message)
        {
            return;
        }
        self.store
            .append(ChatMessage::received(chat.sender, chat.receiver, chat.message));
    }

    /// Tear the current channel down. Also releases the transport's handle
    /// for a channel that already failed.
    fn close_current(&mut self, reason: CloseReason) {
        let Some(slot) = self.channel.as_mut() else {
            return;
        };
        if !slot.is_live() {
            self.transport.close(slot.id);
            return;
        }

        slot.advance(Trigger::Close);
        self.transport.close(slot.id);
        slot.advance(Trigger::Finished(reason));
        info!(channel = %slot.id, peer = %slot.peer, state = %slot.state, "chat channel closed");
    }
}

impl<T: Transport> Drop for ChannelManager<T> {
    fn drop(&mut self) {
        self.close_current(CloseReason::UserInitiated);
    }
}
