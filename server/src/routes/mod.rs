//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The relay exposes the chat websocket and a health probe. Requests are
//! traced with `tower-http`.

pub mod ws;

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::state::RelayState;

pub fn app(state: RelayState) -> Router {
    Router::new()
        .route("/ws/chat/", get(ws::handle_chat_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
