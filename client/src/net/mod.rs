//! REST collaborator client: accounts, users, and interests.
//!
//! The chat core never calls these endpoints itself. The directory consumes
//! accepted connections through [`crate::directory::PeerSource`]; the CLI
//! uses the rest directly.

pub mod api;
pub mod types;

pub use api::{ApiClient, ApiError};
pub use types::{InterestRecord, InterestStatus, SignupRequest};
