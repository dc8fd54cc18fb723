//! Client configuration loaded from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

use crate::channel::SendPolicy;
use crate::session::default_session_path;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: `{value}`")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// HTTP(S) base of the REST collaborator and the relay.
    pub base_url: String,
    pub session_path: PathBuf,
    pub connect_timeout: Duration,
    pub send_policy: SendPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            session_path: default_session_path(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            send_policy: SendPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Read `MATCHCHAT_*` variables from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a variable is set but
    /// unparseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an unparseable value.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup("MATCHCHAT_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_owned();
        }
        if let Some(path) = lookup("MATCHCHAT_SESSION").filter(|v| !v.trim().is_empty()) {
            config.session_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("MATCHCHAT_CONNECT_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue { var: "MATCHCHAT_CONNECT_TIMEOUT_SECS", value: raw.clone() })?;
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = lookup("MATCHCHAT_SEND_POLICY") {
            config.send_policy = parse_send_policy(&raw)
                .ok_or(ConfigError::InvalidValue { var: "MATCHCHAT_SEND_POLICY", value: raw.clone() })?;
        }

        Ok(config)
    }
}

/// Parse `optimistic` or `echo` (case-insensitive).
#[must_use]
pub fn parse_send_policy(raw: &str) -> Option<SendPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "optimistic" => Some(SendPolicy::Optimistic),
        "echo" | "echo-only" | "echo_only" => Some(SendPolicy::EchoOnly),
        _ => None,
    }
}
