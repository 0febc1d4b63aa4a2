//! Supabase REST (PostgREST) backend.
//!
//! Each collection maps to the table of the same name under `/rest/v1`.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::{RemoteBackend, SyncError, SyncSession};
use crate::model::CollectionName;
use crate::storage::SyncSettings;

/// Request timeout for table calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgREST client for the remote tables.
pub struct PostgrestBackend {
    /// HTTP client
    http: reqwest::Client,
    /// Project URL, without trailing slash
    base_url: String,
    /// Public API key
    anon_key: String,
}

impl PostgrestBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::NetworkError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        })
    }

    /// Build from configuration; fails when URL or key is missing.
    pub fn from_settings(settings: &SyncSettings) -> Result<Self, SyncError> {
        match (&settings.supabase_url, &settings.anon_key) {
            (Some(url), Some(key)) => Self::new(url, key),
            _ => Err(SyncError::NotConfigured),
        }
    }

    fn table_url(&self, table: CollectionName) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn authorized(&self, request: reqwest::RequestBuilder, session: &SyncSession) -> reqwest::RequestBuilder {
        let token = session.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token))
    }
}

/// Map transport failures onto the sync taxonomy.
fn transport_error(e: reqwest::Error) -> SyncError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        SyncError::NetworkError(e.to_string())
    } else {
        SyncError::ApiError(e.to_string())
    }
}

/// Map a non-success response onto the sync taxonomy.
async fn status_error(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 {
        SyncError::RateLimited
    } else if status.as_u16() == 401 || status.as_u16() == 403 {
        SyncError::AuthorizationRequired
    } else if status.is_server_error() {
        SyncError::ServerError(format!("{}: {}", status, body))
    } else {
        SyncError::ApiError(format!("{}: {}", status, body))
    }
}

/// Query parameters for an incremental select.
fn select_query(user_id: &str, since: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("select", "*".to_string()),
        ("user_id", format!("eq.{}", user_id)),
        ("order", "updated_at.asc".to_string()),
    ];
    if let Some(since) = since {
        query.push((
            "updated_at",
            format!("gt.{}", since.to_rfc3339_opts(SecondsFormat::Micros, true)),
        ));
    }
    query
}

impl RemoteBackend for PostgrestBackend {
    async fn select_since(
        &self,
        session: &SyncSession,
        table: CollectionName,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, SyncError> {
        let request = self
            .http
            .get(self.table_url(table))
            .query(&select_query(session.user_id(), since));

        let response = self
            .authorized(request, session)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| SyncError::SerializationError(e.to_string()))?;

        tracing::debug!("Selected {} {} row(s)", rows.len(), table);
        Ok(rows)
    }

    async fn upsert(
        &self,
        session: &SyncSession,
        table: CollectionName,
        rows: Vec<Value>,
    ) -> Result<(), SyncError> {
        if rows.is_empty() {
            return Ok(());
        }

        let request = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows);

        let response = self
            .authorized(request, session)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        Ok(())
    }
}
