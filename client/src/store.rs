//! Ordered message log for the active conversation.
//!
//! The store is scoped to one peer. The channel manager rescopes it with
//! [`MessageStore::reset`] on every peer switch and whenever a channel opens;
//! entries are only ever appended to the tail.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use crate::channel::PeerId;

/// Delivery state of a stored message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Sent by this client and appended optimistically; no echo seen yet.
    Pending,
    /// Sent by this client and echoed back by the relay.
    Delivered,
    /// Arrived through the channel from any sender.
    Received,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub receiver: Option<String>,
    pub body: String,
    pub client_seq: Option<u64>,
    pub delivery: Delivery,
}

impl ChatMessage {
    #[must_use]
    pub fn received(sender: String, receiver: Option<String>, body: String) -> Self {
        Self { sender, receiver, body, client_seq: None, delivery: Delivery::Received }
    }

    #[must_use]
    pub fn pending(sender: String, receiver: String, body: String, client_seq: u64) -> Self {
        Self {
            sender,
            receiver: Some(receiver),
            body,
            client_seq: Some(client_seq),
            delivery: Delivery::Pending,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MessageStore {
    peer: Option<PeerId>,
    messages: Vec<ChatMessage>,
}

impl MessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every message and rescope the store to `peer`.
    pub fn reset(&mut self, peer: Option<PeerId>) {
        self.peer = peer;
        self.messages.clear();
    }

    /// Append to the tail and return the new entry's index.
    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Mark the oldest pending message with `body` as delivered.
    ///
    /// Returns `false` when no pending message matches, in which case the
    /// caller appends the echo as a regular message.
    pub fn confirm_echo(&mut self, body: &str) -> bool {
        let Some(entry) = self
            .messages
            .iter_mut()
            .find(|m| m.delivery == Delivery::Pending && m.body == body)
        else {
            return false;
        };
        entry.delivery = Delivery::Delivered;
        true
    }

    #[must_use]
    pub fn peer(&self) -> Option<&PeerId> {
        self.peer.as_ref()
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
