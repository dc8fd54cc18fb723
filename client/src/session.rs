//! Credential context and the persisted session record.
//!
//! DESIGN
//! ======
//! The session record is written once at login and read at startup. The core
//! never reads it ad hoc: callers load it and hand a [`CredentialContext`] to
//! the channel manager, which fails closed when the context is empty.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Error loading or saving the session record.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The record parsed but carries an empty access token.
    #[error("session record has no access token")]
    MissingToken,
}

/// A user as reported by the REST collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// The persisted session record: bearer token plus who it belongs to.
///
/// Also the shape of the login response, including its `usename` spelling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    #[serde(default, deserialize_with = "opt_id_string", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, alias = "usename", skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Read-only credentials handed to the channel manager.
#[derive(Clone, Debug, Default)]
pub struct CredentialContext {
    session: Option<Session>,
}

impl CredentialContext {
    #[must_use]
    pub fn new(session: Option<Session>) -> Self {
        let session = session.filter(|s| !s.access.trim().is_empty());
        Self { session }
    }

    /// A context without credentials. Every channel operation fails closed.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access.as_str())
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.email.as_str())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(|s| s.user_id.as_deref())
    }

    /// Whether a sender reference names the current identity.
    ///
    /// Producers identify senders by email, user id, or username.
    #[must_use]
    pub fn is_me(&self, sender: &str) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        session.email == sender
            || session.user_id.as_deref() == Some(sender)
            || session.username.as_deref() == Some(sender)
    }

    /// Whether an identity is the current user.
    #[must_use]
    pub fn is_identity(&self, identity: &Identity) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        if !session.email.is_empty() && identity.email == session.email {
            return true;
        }
        session.user_id.as_deref() == Some(identity.id.as_str())
    }
}

/// Default location of the session file: `<config dir>/matchchat/session.json`.
#[must_use]
pub fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("matchchat")
        .join("session.json")
}

/// Load the session record. A missing file is `Ok(None)`.
///
/// # Errors
///
/// Returns [`SessionError`] when the file exists but cannot be read, is not
/// a valid record, or has an empty access token.
pub fn load_session(path: &Path) -> Result<Option<Session>, SessionError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let session = serde_json::from_str::<Session>(&raw)?;
    if session.access.trim().is_empty() {
        return Err(SessionError::MissingToken);
    }
    Ok(Some(session))
}

/// Persist the session record, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`SessionError`] on serialization or I/O failure.
pub fn save_session(path: &Path, session: &Session) -> Result<(), SessionError> {
    if session.access.trim().is_empty() {
        return Err(SessionError::MissingToken);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = serde_json::to_string_pretty(session)?;
    std::fs::write(path, rendered)?;
    Ok(())
}

/// Remove the session record. Removing a missing file is not an error.
///
/// # Errors
///
/// Returns [`SessionError::Io`] for any other I/O failure.
pub fn clear_session(path: &Path) -> Result<(), SessionError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    frames::id_text(&value).ok_or_else(|| serde::de::Error::custom("expected a string or integer id"))
}

pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(frames::id_text))
}
