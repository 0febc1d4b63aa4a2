//! Remote Sync
//!
//! Pushes the pending-push outbox to a remote table backend and pulls remote
//! changes back into the store, gated by the authenticated session.

pub mod controller;
pub mod memory;
pub mod postgrest;

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::model::{CollectionName, WriteContext};
use crate::store::StoreError;

// Re-export main types
pub use controller::{SyncController, SyncReport, SyncStatus};
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;

/// Sync-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error("Remote backend not configured")]
    NotConfigured,

    #[error("Authorization required")]
    AuthorizationRequired,

    #[error("Sync is disabled")]
    Disabled,

    #[error("Sync session is no longer current")]
    StaleSession,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkError(_) | SyncError::ServerError(_) | SyncError::RateLimited
        )
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::StaleIdentity => SyncError::StaleSession,
            other => SyncError::Store(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::SerializationError(e.to_string())
    }
}

/// Credentials and identity a sync round runs under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSession {
    /// Identity snapshot; rows owned by anyone else are never pushed
    pub context: WriteContext,
    /// Bearer token for the remote backend
    pub access_token: Option<String>,
}

impl SyncSession {
    pub fn new(context: WriteContext, access_token: Option<String>) -> Self {
        Self {
            context,
            access_token,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.context.user_id
    }
}

/// A table-per-collection remote store.
pub trait RemoteBackend: Send + Sync + 'static {
    /// Rows of `table` owned by the session user with `updated_at > since`,
    /// oldest first.
    fn select_since(
        &self,
        session: &SyncSession,
        table: CollectionName,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, SyncError>> + Send;

    /// Insert-or-update rows by id. Soft deletes travel as `deleted = true`.
    fn upsert(
        &self,
        session: &SyncSession,
        table: CollectionName,
        rows: Vec<Value>,
    ) -> impl std::future::Future<Output = Result<(), SyncError>> + Send;

    /// Realtime hook: changes since the cursor. Backends without a change
    /// feed answer with a plain filtered select.
    fn poll_changes(
        &self,
        session: &SyncSession,
        table: CollectionName,
        since: Option<DateTime<Utc>>,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, SyncError>> + Send {
        self.select_since(session, table, since)
    }
}
