//! Shared relay state.
//!
//! DESIGN
//! ======
//! `RelayState` is injected into Axum handlers via the `State` extractor. It
//! holds the static token table and the live rooms. Each room maps a
//! connection id to the sender half of that connection's outbound queue; a
//! room is evicted when its last member leaves.

#[cfg(test)]
#[path = "state_test.rs"]
mod state_test;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

/// Connection id -> outbound text frames.
pub type Room = HashMap<Uuid, mpsc::Sender<String>>;

/// Shared relay state. Clone is required by Axum; all fields are Arc-wrapped.
#[derive(Clone, Default)]
pub struct RelayState {
    tokens: Arc<HashMap<String, String>>,
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RelayState {
    #[must_use]
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens: Arc::new(tokens), rooms: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// User id the token was issued to.
    #[must_use]
    pub fn resolve_token(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(String::as_str)
    }

    pub async fn join(&self, room: &str, connection: Uuid, tx: mpsc::Sender<String>) {
        let mut rooms = self.rooms.write().await;
        let members = rooms.entry(room.to_owned()).or_default();
        members.insert(connection, tx);
        info!(%room, %connection, members = members.len(), "joined room");
    }

    pub async fn part(&self, room: &str, connection: Uuid) {
        let mut rooms = self.rooms.write().await;
        let Some(members) = rooms.get_mut(room) else {
            return;
        };
        members.remove(&connection);
        info!(%room, %connection, remaining = members.len(), "left room");
        if members.is_empty() {
            rooms.remove(room);
            debug!(%room, "evicted empty room");
        }
    }

    /// Queue `text` for every member of `room`. Returns how many accepted it.
    pub async fn broadcast(&self, room: &str, text: &str) -> usize {
        let rooms = self.rooms.read().await;
        let Some(members) = rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for (connection, tx) in members {
            // Best-effort: a member whose queue is full misses the frame.
            if tx.try_send(text.to_owned()).is_ok() {
                delivered += 1;
            } else {
                debug!(%room, %connection, "member queue full or closed");
            }
        }
        delivered
    }

    pub async fn member_count(&self, room: &str) -> usize {
        self.rooms.read().await.get(room).map_or(0, HashMap::len)
    }
}
