//! Conversation directory: the peers the current user may chat with.
//!
//! Peers come from accepted connections. The list is fetched once per bearer
//! token and cached until the token changes or [`Directory::invalidate`] is
//! called.

#[cfg(test)]
#[path = "directory_test.rs"]
mod directory_test;

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::channel::PeerId;
use crate::error::ChatError;
use crate::net::{ApiClient, ApiError, InterestRecord, InterestStatus};
use crate::session::{CredentialContext, Identity};

/// Source of accepted connections.
#[async_trait]
pub trait PeerSource {
    async fn accepted_connections(&self, token: &str) -> Result<Vec<InterestRecord>, ApiError>;
}

#[async_trait]
impl PeerSource for ApiClient {
    async fn accepted_connections(&self, token: &str) -> Result<Vec<InterestRecord>, ApiError> {
        ApiClient::accepted_connections(self, token).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub peer_id: PeerId,
    pub display_name: String,
    pub email: String,
    /// Status of the connection the peer was derived from.
    pub status: InterestStatus,
}

impl Peer {
    fn from_identity(identity: &Identity, status: InterestStatus) -> Self {
        let display_name = if identity.username.is_empty() {
            identity.email.clone()
        } else {
            identity.username.clone()
        };
        Self {
            peer_id: PeerId::new(identity.id.clone()),
            display_name,
            email: identity.email.clone(),
            status,
        }
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    cached_for: Option<String>,
    peers: Vec<Peer>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Peers for the current credentials, fetching on the first call and
    /// whenever the token changed since the last fetch.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::AuthMissing`] without a session and
    /// [`ChatError::Api`] when the fetch fails. A failed fetch keeps nothing.
    pub async fn peers<S>(&mut self, source: &S, context: &CredentialContext) -> Result<&[Peer], ChatError>
    where
        S: PeerSource + Sync + ?Sized,
    {
        let Some(token) = context.token() else {
            return Err(ChatError::AuthMissing);
        };
        if self.cached_for.as_deref() == Some(token) {
            return Ok(&self.peers);
        }

        self.invalidate();
        let connections = source.accepted_connections(token).await?;
        self.peers = peers_from_connections(&connections, context);
        self.cached_for = Some(token.to_owned());
        debug!(count = self.peers.len(), "directory refreshed");
        Ok(&self.peers)
    }

    /// Drop the cache so the next [`Directory::peers`] call refetches.
    pub fn invalidate(&mut self) {
        self.cached_for = None;
        self.peers.clear();
    }
}

/// The counterpart of each connection, de-duplicated by peer id.
#[must_use]
pub fn peers_from_connections(connections: &[InterestRecord], context: &CredentialContext) -> Vec<Peer> {
    let mut seen = HashSet::new();
    connections
        .iter()
        .map(|c| {
            let other = if context.is_identity(&c.sender) { &c.receiver } else { &c.sender };
            Peer::from_identity(other, c.status)
        })
        .filter(|peer| seen.insert(peer.peer_id.clone()))
        .collect()
}

/// One row of the interest listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterestRow {
    pub interest_id: String,
    /// The other party of the interest.
    pub peer: Peer,
    pub status: InterestStatus,
    /// Pending and addressed to the current user, so it can be accepted or
    /// rejected.
    pub actionable: bool,
}

#[must_use]
pub fn interest_rows(interests: &[InterestRecord], context: &CredentialContext) -> Vec<InterestRow> {
    interests
        .iter()
        .map(|interest| {
            let incoming = context.is_identity(&interest.receiver);
            let other = if incoming { &interest.sender } else { &interest.receiver };
            InterestRow {
                interest_id: interest.id.clone(),
                peer: Peer::from_identity(other, interest.status),
                status: interest.status,
                actionable: incoming && interest.status == InterestStatus::Pending,
            }
        })
        .collect()
}

/// Every user except the current one.
#[must_use]
pub fn other_users(users: &[Identity], context: &CredentialContext) -> Vec<Identity> {
    users
        .iter()
        .filter(|user| !context.is_identity(user))
        .cloned()
        .collect()
}
