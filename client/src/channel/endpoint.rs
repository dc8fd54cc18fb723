//! Websocket endpoint for chat channels.

#[cfg(test)]
#[path = "endpoint_test.rs"]
mod endpoint_test;

use url::Url;

use super::PeerId;
use crate::error::ChatError;

/// Websocket base (`ws://host` or `wss://host`) the channel URLs hang off.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEndpoint {
    ws_base: Url,
}

impl ChatEndpoint {
    /// Derive the websocket base from an HTTP(S) or WS(S) base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidBaseUrl`] for any other scheme or a URL
    /// without a host.
    pub fn from_base_url(base_url: &str) -> Result<Self, ChatError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = || ChatError::InvalidBaseUrl(base_url.to_owned());

        let ws_base = if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
            trimmed.to_owned()
        } else {
            return Err(invalid());
        };

        let ws_base = Url::parse(&ws_base).map_err(|_| invalid())?;
        if ws_base.host_str().is_none_or(str::is_empty) {
            return Err(invalid());
        }
        Ok(Self { ws_base })
    }

    /// URL of the channel for one `(token, peer)` pair. Both query values are
    /// form-encoded, so a peer id can never inject extra parameters.
    #[must_use]
    pub fn channel_url(&self, token: &str, peer: &PeerId) -> String {
        let mut url = self.ws_base.clone();
        let path = format!("{}/ws/chat/", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url.query_pairs_mut()
            .append_pair("token", token)
            .append_pair("recipient", peer.as_str());
        url.into()
    }
}
