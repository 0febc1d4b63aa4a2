//! Supabase GoTrue auth client.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;

use super::{AuthError, AuthProvider, AuthSession};
use crate::model::Identity;
use crate::storage::SyncSettings;
use crate::store::Store;

/// `auth_state` key holding the persisted session.
pub const SESSION_KEY: &str = "session";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    user: GoTrueUser,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_in = self.expires_in.unwrap_or(3600);
        AuthSession {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }
}

/// The session persisted by the last sign-in, expired or not.
pub fn stored_session(store: &Store) -> Result<Option<AuthSession>, AuthError> {
    match store.load_auth_state(SESSION_KEY)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Set the identity register from the persisted session without contacting
/// the provider or enabling sync.
pub fn adopt_stored_identity(store: &Store) -> Result<Identity, AuthError> {
    let identity = match stored_session(store)? {
        Some(session) => Identity::User(session.user_id),
        None => Identity::Local,
    };
    store.identity().set(identity.clone());
    Ok(identity)
}

/// GoTrue error bodies use different field names per endpoint.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
}

/// Password auth against `/auth/v1`, with the session kept in `auth_state`.
pub struct GoTrueAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    store: Store,
    session_tx: watch::Sender<Option<AuthSession>>,
}

impl GoTrueAuth {
    pub fn new(base_url: &str, anon_key: &str, store: Store) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        let (session_tx, _) = watch::channel(None);

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            store,
            session_tx,
        })
    }

    pub fn from_settings(settings: &SyncSettings, store: Store) -> Result<Self, AuthError> {
        match (&settings.supabase_url, &settings.anon_key) {
            (Some(url), Some(key)) => Self::new(url, key, store),
            _ => Err(AuthError::NotConfigured),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn load_stored(&self) -> Result<Option<AuthSession>, AuthError> {
        stored_session(&self.store)
    }

    fn persist(&self, session: Option<&AuthSession>) -> Result<(), AuthError> {
        match session {
            Some(session) => self
                .store
                .save_auth_state(SESSION_KEY, &serde_json::to_string(session)?)?,
            None => self.store.delete_auth_state(SESSION_KEY)?,
        }
        self.session_tx.send_replace(session.cloned());
        Ok(())
    }

    async fn token_request(&self, grant_type: &str, body: serde_json::Value) -> Result<AuthSession, AuthError> {
        let response = self
            .http
            .post(self.endpoint("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(e.to_string()))?;
        Ok(token.into_session())
    }

    async fn refresh(&self, stored: &AuthSession) -> Result<AuthSession, AuthError> {
        let refresh_token = stored
            .refresh_token
            .as_deref()
            .ok_or(AuthError::SessionExpired)?;

        tracing::debug!("Refreshing session for {}", stored.user_id);
        self.token_request("refresh_token", json!({ "refresh_token": refresh_token }))
            .await
    }
}

fn transport_error(e: reqwest::Error) -> AuthError {
    AuthError::NetworkError(e.to_string())
}

async fn status_error(response: reqwest::Response) -> AuthError {
    let status = response.status();
    let body: ErrorBody = response.json().await.unwrap_or_default();
    let message = body
        .error_description
        .or(body.msg)
        .or(body.message)
        .unwrap_or_else(|| status.to_string());

    match status.as_u16() {
        400 | 401 | 403 | 422 => AuthError::InvalidCredentials(message),
        429 => AuthError::RateLimited,
        _ if status.is_server_error() => AuthError::NetworkError(message),
        _ => AuthError::ApiError(message),
    }
}

impl AuthProvider for GoTrueAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        let Some(stored) = self.load_stored()? else {
            self.session_tx.send_replace(None);
            return Ok(None);
        };

        let margin = chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        if stored.expires_at - margin > Utc::now() {
            self.session_tx.send_replace(Some(stored.clone()));
            return Ok(Some(stored));
        }

        match self.refresh(&stored).await {
            Ok(session) => {
                self.persist(Some(&session))?;
                Ok(Some(session))
            }
            Err(AuthError::InvalidCredentials(reason)) => {
                tracing::info!("Stored session rejected ({}); signing out locally", reason);
                self.persist(None)?;
                Ok(None)
            }
            Err(AuthError::SessionExpired) => {
                self.persist(None)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Option<AuthSession>, AuthError> {
        let response = self
            .http
            .post(self.endpoint("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AuthError::ApiError(e.to_string()))?;

        // Without auto-confirm the body is the bare user and no session exists yet.
        if body.get("access_token").is_none() {
            tracing::info!("Sign-up for {} awaits confirmation", email);
            return Ok(None);
        }

        let session = serde_json::from_value::<TokenResponse>(body)
            .map_err(|e| AuthError::ApiError(e.to_string()))?
            .into_session();
        self.persist(Some(&session))?;
        Ok(Some(session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .token_request("password", json!({ "email": email, "password": password }))
            .await?;
        self.persist(Some(&session))?;
        tracing::info!("Signed in as {}", session.user_id);
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(stored) = self.load_stored()? {
            let result = self
                .http
                .post(self.endpoint("logout"))
                .header("apikey", &self.anon_key)
                .header("Authorization", format!("Bearer {}", stored.access_token))
                .send()
                .await;

            match result {
                Ok(response) if !response.status().is_success() => {
                    tracing::warn!("Remote sign-out returned {}", response.status());
                }
                Err(e) => tracing::warn!("Remote sign-out failed: {}", e),
                Ok(_) => {}
            }
        }

        self.persist(None)
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.session_tx.subscribe()
    }
}
