//! Authentication
//!
//! The auth provider is an external collaborator; this module only defines
//! the boundary and reacts to session changes.

pub mod coordinator;
pub mod gotrue;
pub mod memory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

pub use coordinator::{AuthCoordinator, SessionRestore, SignInReport};
pub use gotrue::{adopt_stored_identity, GoTrueAuth};
pub use memory::MemoryAuth;

/// Auth-related errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error("Auth provider not configured")]
    NotConfigured,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<crate::store::StoreError> for AuthError {
    fn from(e: crate::store::StoreError) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Authenticated user id
    pub user_id: String,
    pub email: Option<String>,
    /// Bearer token for remote calls
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Authentication boundary.
pub trait AuthProvider: Send + Sync + 'static {
    /// Restore the persisted session, if any.
    fn current_session(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<AuthSession>, AuthError>> + Send;

    /// Create an account. `None` when the provider requires confirmation
    /// before issuing a session.
    fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<Option<AuthSession>, AuthError>> + Send;

    fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<AuthSession, AuthError>> + Send;

    fn sign_out(&self) -> impl std::future::Future<Output = Result<(), AuthError>> + Send;

    /// Session changes, starting from the current value.
    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>>;
}
