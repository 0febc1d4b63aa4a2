//! Identity register: who the current writes belong to.
//!
//! Every write helper takes a [`WriteContext`] snapshot instead of reading a
//! global. The `epoch` counter changes on every identity switch so that
//! asynchronous work started under one identity can detect that it is stale.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// User id placeholder for data created before sign-in.
pub const LOCAL_USER_ID: &str = "local";

/// Returns true when a stored `user_id` belongs to the local placeholder.
///
/// An empty id counts as placeholder-owned (records written before the field
/// existed).
pub fn is_placeholder_owner(user_id: &str) -> bool {
    user_id.is_empty() || user_id == LOCAL_USER_ID
}

/// Current owner of local writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    /// Anonymous, local-only use
    #[default]
    Local,
    /// Authenticated user id from the auth provider
    User(String),
}

impl Identity {
    /// The `user_id` written into records.
    pub fn user_id(&self) -> &str {
        match self {
            Identity::Local => LOCAL_USER_ID,
            Identity::User(id) => id,
        }
    }

    /// Whether this identity came from an authenticated session.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::User(_))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Local => write!(f, "local"),
            Identity::User(id) => write!(f, "user {}", id),
        }
    }
}

/// Snapshot of the identity captured at call time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteContext {
    /// Owner tag for new records
    pub user_id: String,
    /// Register epoch when the snapshot was taken
    pub epoch: u64,
}

impl WriteContext {
    /// Context for anonymous local writes outside any register.
    pub fn local() -> Self {
        Self {
            user_id: LOCAL_USER_ID.to_string(),
            epoch: 0,
        }
    }

    /// Whether writes under this context use the placeholder owner.
    pub fn is_placeholder(&self) -> bool {
        is_placeholder_owner(&self.user_id)
    }
}

/// Holds the current identity and its epoch.
#[derive(Debug, Default)]
pub struct IdentityRegister {
    identity: RwLock<Identity>,
    epoch: AtomicU64,
}

impl IdentityRegister {
    /// Create a register starting at the local placeholder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current identity.
    pub fn current(&self) -> Identity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Snapshot the identity for a write.
    pub fn context(&self) -> WriteContext {
        let guard = self.identity.read().unwrap_or_else(PoisonError::into_inner);
        WriteContext {
            user_id: guard.user_id().to_string(),
            epoch: self.epoch.load(Ordering::SeqCst),
        }
    }

    /// Switch identity and return the context for the new one.
    pub fn set(&self, identity: Identity) -> WriteContext {
        let mut guard = self.identity.write().unwrap_or_else(PoisonError::into_inner);
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!("Identity changed to {} (epoch {})", identity, epoch);
        *guard = identity;

        WriteContext {
            user_id: guard.user_id().to_string(),
            epoch,
        }
    }

    /// Whether a context captured earlier still matches the register.
    pub fn is_current(&self, ctx: &WriteContext) -> bool {
        self.epoch() == ctx.epoch
    }
}
