//! Relay configuration loaded from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::collections::HashMap;

const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: `{0}`")]
    InvalidPort(String),
    #[error("invalid RELAY_TOKENS entry `{0}`; expected token:user_id")]
    InvalidToken(String),
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub port: u16,
    /// Bearer token -> user id.
    pub tokens: HashMap<String, String>,
}

impl RelayConfig {
    /// Read `PORT` and `RELAY_TOKENS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unparseable port or token entry.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            Err(_) => DEFAULT_PORT,
        };
        let tokens = parse_tokens(&std::env::var("RELAY_TOKENS").unwrap_or_default())?;
        Ok(Self { port, tokens })
    }
}

/// Parse `tok:1,tok2:2` into a token table. Blank entries are skipped.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidToken`] for an entry without both parts.
pub fn parse_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (token, user_id) = entry
                .split_once(':')
                .map(|(t, u)| (t.trim(), u.trim()))
                .filter(|(t, u)| !t.is_empty() && !u.is_empty())
                .ok_or_else(|| ConfigError::InvalidToken(entry.to_owned()))?;
            Ok((token.to_owned(), user_id.to_owned()))
        })
        .collect()
}
