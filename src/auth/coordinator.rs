//! Reacts to session changes: identity, migration, then sync.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;

use super::{AuthError, AuthProvider, AuthSession};
use crate::migration::{migrate_local_data, MigrationReport};
use crate::model::Identity;
use crate::store::Store;
use crate::sync::{RemoteBackend, SyncController, SyncReport, SyncSession};

/// Outcome of restoring the session at startup.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionRestore {
    SignedIn(SignInReport),
    Anonymous,
    /// The provider could not be reached; the app continues locally.
    Offline(AuthError),
}

/// What happened when a session became active.
#[derive(Debug, Clone, PartialEq)]
pub struct SignInReport {
    pub user_id: String,
    /// `None` when migration could not run at all
    pub migration: Option<MigrationReport>,
    /// `None` when sync could not be enabled
    pub initial_sync: Option<SyncReport>,
}

/// Session key last handled, so provider echoes are not processed twice.
type Handled = Option<(String, String)>;

fn handled_key(session: Option<&AuthSession>) -> Handled {
    session.map(|s| (s.user_id.clone(), s.access_token.clone()))
}

/// Ties an [`AuthProvider`] to the store and the sync controller.
pub struct AuthCoordinator<A: AuthProvider, B: RemoteBackend> {
    auth: Arc<A>,
    store: Store,
    sync: SyncController<B>,
    last_handled: Mutex<Option<Handled>>,
}

impl<A: AuthProvider, B: RemoteBackend> AuthCoordinator<A, B> {
    pub fn new(auth: Arc<A>, store: Store, sync: SyncController<B>) -> Self {
        Self {
            auth,
            store,
            sync,
            last_handled: Mutex::new(None),
        }
    }

    pub fn auth(&self) -> &Arc<A> {
        &self.auth
    }

    pub fn sync(&self) -> &SyncController<B> {
        &self.sync
    }

    /// Restore the persisted session and bring sync up for it.
    pub async fn restore(&self) -> SessionRestore {
        match self.auth.current_session().await {
            Ok(Some(session)) => match self.handle_session_change(Some(&session)).await {
                Some(report) => SessionRestore::SignedIn(report),
                None => SessionRestore::Anonymous,
            },
            Ok(None) => {
                self.handle_session_change(None).await;
                SessionRestore::Anonymous
            }
            Err(e) => {
                tracing::warn!("Could not restore session, continuing offline: {}", e);
                SessionRestore::Offline(e)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<SignInReport>, AuthError> {
        match self.auth.sign_up(email, password).await? {
            Some(session) => Ok(self.handle_session_change(Some(&session)).await),
            None => Ok(None),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInReport, AuthError> {
        let session = self.auth.sign_in(email, password).await?;
        let report = self.handle_session_change(Some(&session)).await;
        Ok(report.unwrap_or_else(|| SignInReport {
            user_id: session.user_id.clone(),
            migration: None,
            initial_sync: None,
        }))
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.auth.sign_out().await;
        // Local state goes back to anonymous even if the provider call failed.
        self.handle_session_change(None).await;
        result
    }

    /// Apply a session change.
    ///
    /// Signed in: switch identity, migrate placeholder-owned records, enable
    /// sync and start the worker. Migration failures are reported and do not
    /// block sync; the records stay local and are retried on the next sign-in.
    ///
    /// Signed out: disable sync first, then reset the identity.
    ///
    /// Returns `None` for sign-out and for a session already handled.
    pub async fn handle_session_change(&self, session: Option<&AuthSession>) -> Option<SignInReport> {
        {
            let mut last = self.last_handled.lock().unwrap_or_else(PoisonError::into_inner);
            let key = handled_key(session);
            if last.as_ref() == Some(&key) {
                return None;
            }
            *last = Some(key);
        }

        let Some(session) = session else {
            self.sync.disable_all();
            self.store.identity().set(Identity::Local);
            tracing::info!("Signed out; writes are local again");
            return None;
        };

        let ctx = self
            .store
            .identity()
            .set(Identity::User(session.user_id.clone()));

        let migration = match migrate_local_data(&self.store, &ctx) {
            Ok(report) => {
                if !report.is_complete() {
                    tracing::warn!(
                        "{} record(s) could not be migrated to {}; they stay local",
                        report.failures.len(),
                        session.user_id
                    );
                }
                Some(report)
            }
            Err(e) => {
                tracing::error!("Local data migration failed: {}", e);
                None
            }
        };

        let sync_session = SyncSession::new(ctx, Some(session.access_token.clone()));
        let initial_sync = match self.sync.enable_all(sync_session).await {
            Ok(report) => {
                if let Err(e) = self.sync.start() {
                    tracing::warn!("Sync worker not started: {}", e);
                }
                Some(report)
            }
            Err(e) => {
                tracing::warn!("Sync not enabled for {}: {}", session.user_id, e);
                None
            }
        };

        Some(SignInReport {
            user_id: session.user_id.clone(),
            migration,
            initial_sync,
        })
    }

    /// Follow provider-side session changes (token refresh, remote sign-out)
    /// until the provider is dropped.
    pub fn listen(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        let mut rx = self.auth.subscribe();

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let session = rx.borrow_and_update().clone();
                coordinator.handle_session_change(session.as_ref()).await;
            }
            tracing::debug!("Auth listener stopped");
        })
    }
}
