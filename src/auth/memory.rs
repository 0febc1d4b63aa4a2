//! In-process auth provider for tests and offline runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use super::{AuthError, AuthProvider, AuthSession};

#[derive(Default)]
struct Accounts {
    /// email -> (password, user id)
    users: HashMap<String, (String, String)>,
    restore_error: Option<AuthError>,
}

/// Accounts held in memory; sessions never expire.
pub struct MemoryAuth {
    accounts: Mutex<Accounts>,
    session_tx: watch::Sender<Option<AuthSession>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(Accounts::default()),
            session_tx,
        }
    }

    fn accounts(&self) -> MutexGuard<'_, Accounts> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account with a fixed user id.
    pub fn add_user(&self, email: &str, password: &str, user_id: &str) {
        self.accounts()
            .users
            .insert(email.to_string(), (password.to_string(), user_id.to_string()));
    }

    /// Make `current_session` fail, as when the provider is unreachable.
    pub fn fail_restore(&self, error: Option<AuthError>) {
        self.accounts().restore_error = error;
    }

    /// Replace the session directly, as a provider-side change would.
    pub fn set_session(&self, session: Option<AuthSession>) {
        self.session_tx.send_replace(session);
    }

    fn issue(user_id: &str, email: &str) -> AuthSession {
        AuthSession {
            user_id: user_id.to_string(),
            email: Some(email.to_string()),
            access_token: format!("token-{}", Uuid::new_v4()),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::days(365),
        }
    }
}

impl AuthProvider for MemoryAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        if let Some(error) = self.accounts().restore_error.clone() {
            return Err(error);
        }
        Ok(self.session_tx.borrow().clone())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthSession>, AuthError> {
        let user_id = {
            let mut accounts = self.accounts();
            if accounts.users.contains_key(email) {
                return Err(AuthError::InvalidCredentials("User already registered".to_string()));
            }
            let user_id = Uuid::new_v4().to_string();
            accounts
                .users
                .insert(email.to_string(), (password.to_string(), user_id.clone()));
            user_id
        };

        let session = Self::issue(&user_id, email);
        self.session_tx.send_replace(Some(session.clone()));
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user_id = match self.accounts().users.get(email) {
            Some((stored, user_id)) if stored == password => user_id.clone(),
            _ => {
                return Err(AuthError::InvalidCredentials(
                    "Invalid login credentials".to_string(),
                ))
            }
        };

        let session = Self::issue(&user_id, email);
        self.session_tx.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.session_tx.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session_tx.subscribe()
    }
}
