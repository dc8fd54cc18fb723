//! Chat relay: a websocket endpoint that pairs two users in a room.
//!
//! SYSTEM CONTEXT
//! ==============
//! Clients connect to `/ws/chat/?token=<token>&recipient=<user id>`. The
//! relay resolves the token to a user id from a static table, joins the
//! connection to the room shared with the recipient, and rebroadcasts every
//! valid chat message to all members of that room, sender included. Tokens
//! are issued elsewhere; the relay only checks them.

pub mod config;
pub mod routes;
pub mod state;

use tokio::net::TcpListener;

pub use config::RelayConfig;
pub use routes::app;
pub use state::RelayState;

/// Serve the relay on an already-bound listener until the process stops.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve(listener: TcpListener, state: RelayState) -> std::io::Result<()> {
    axum::serve(listener, app(state)).await
}
