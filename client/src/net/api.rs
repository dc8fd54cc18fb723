//! reqwest client for the REST collaborator.
//!
//! ERROR HANDLING
//! ==============
//! Transport and decoding failures surface as [`ApiError::Http`]. A non-2xx
//! response surfaces as [`ApiError::Status`] carrying the raw body so the
//! caller can show the collaborator's own message.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{InterestRecord, LoginRequest, SignupRequest, id_json};
use crate::session::{Identity, Session};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl ApiClient {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim().trim_end_matches('/').to_owned(), http: reqwest::Client::new() }
    }

    /// Exchange credentials for a session record.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] for rejected credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, ApiError> {
        self.call(Method::POST, "/api/login/", None, Some(&LoginRequest { username, password }))
            .await
    }

    /// Create an account. Returns the collaborator's response body.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] with the validation errors on rejection.
    pub async fn signup(&self, request: &SignupRequest) -> Result<Value, ApiError> {
        self.call(Method::POST, "/api/signup/", None, Some(request)).await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn users(&self, token: &str) -> Result<Vec<Identity>, ApiError> {
        self.call::<_, ()>(Method::GET, "/api/users/", Some(token), None).await
    }

    /// Interests the current user sent or received.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn interests(&self, token: &str) -> Result<Vec<InterestRecord>, ApiError> {
        self.call::<_, ()>(Method::GET, "/api/recieved-interest/", Some(token), None)
            .await
    }

    /// Accepted connections; the peers the current user may chat with.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn accepted_connections(&self, token: &str) -> Result<Vec<InterestRecord>, ApiError> {
        self.call::<_, ()>(Method::GET, "/api/accept-interest/", Some(token), None)
            .await
    }

    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn send_interest(&self, token: &str, receiver: &str) -> Result<Value, ApiError> {
        let body = json!({ "receiver": id_json(receiver) });
        self.call(Method::POST, "/api/send-interest/", Some(token), Some(&body)).await
    }

    /// Accept the pending interest sent by `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn accept_interest(&self, token: &str, sender: &str) -> Result<Value, ApiError> {
        let body = json!({ "user_id": id_json(sender) });
        self.call(Method::POST, "/api/accept-interest/", Some(token), Some(&body)).await
    }

    /// Reject the pending interest sent by `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn reject_interest(&self, token: &str, sender: &str) -> Result<Value, ApiError> {
        let body = json!({ "user_id": id_json(sender) });
        self.call(Method::POST, "/api/reject-interest/", Some(token), Some(&body)).await
    }

    async fn call<R, B>(&self, method: Method, path: &str, token: Option<&str>, body: Option<&B>) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = endpoint(&self.base_url, path);
        debug!(%method, %url, "rest request");

        let mut request = self.http.request(method, &url);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, bearer_header(token)?);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = check_status(request.send().await?).await?;
        Ok(response.json::<R>().await?)
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}

/// Absolute URL of `path` under `base_url`.
#[must_use]
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// `Authorization` header value for a bearer token.
///
/// # Errors
///
/// Returns [`ApiError::InvalidHeader`] when the token has characters a
/// header cannot carry.
pub fn bearer_header(token: &str) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
    value.set_sensitive(true);
    Ok(value)
}
