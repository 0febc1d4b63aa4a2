//! In-process remote backend.
//!
//! Stores rows per table keyed by id, answers `updated_at` filtered selects
//! and enforces row ownership like a row-level-security policy would. Used by
//! tests and for running sync without a server.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{RemoteBackend, SyncError, SyncSession};
use crate::model::CollectionName;

/// A write accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertRecord {
    /// User the request was authenticated as
    pub session_user: String,
    pub table: CollectionName,
    pub id: String,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<CollectionName, BTreeMap<String, Value>>,
    upserts: Vec<UpsertRecord>,
    failures: VecDeque<SyncError>,
}

/// Remote tables held in memory.
#[derive(Default)]
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    offline: AtomicBool,
    requests: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

fn row_updated_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

fn row_str<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every request with a network error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&self, error: SyncError) {
        self.tables().failures.push_back(error);
    }

    /// Delay every request, to hold rounds in flight.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of requests received, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Every row of a table regardless of owner.
    pub fn rows(&self, table: CollectionName) -> Vec<Value> {
        self.tables()
            .rows
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Rows of a table owned by `user_id`.
    pub fn rows_for(&self, table: CollectionName, user_id: &str) -> Vec<Value> {
        self.rows(table)
            .into_iter()
            .filter(|row| row_str(row, "user_id") == Some(user_id))
            .collect()
    }

    /// Accepted writes in arrival order.
    pub fn upserts(&self) -> Vec<UpsertRecord> {
        self.tables().upserts.clone()
    }

    /// Write a row directly, as another device would.
    pub fn put_row(&self, table: CollectionName, row: Value) {
        if let Some(id) = row_str(&row, "id").map(str::to_string) {
            self.tables().rows.entry(table).or_default().insert(id, row);
        }
    }

    async fn begin_request(&self) -> Result<(), SyncError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::NetworkError("backend unreachable".to_string()));
        }
        match self.tables().failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl RemoteBackend for MemoryBackend {
    async fn select_since(
        &self,
        session: &SyncSession,
        table: CollectionName,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, SyncError> {
        self.begin_request().await?;

        let mut rows: Vec<(Option<DateTime<Utc>>, Value)> = self
            .rows_for(table, session.user_id())
            .into_iter()
            .map(|row| (row_updated_at(&row), row))
            .filter(|(at, _)| match (since, at) {
                (Some(since), Some(at)) => *at > since,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();
        rows.sort_by_key(|(at, _)| *at);

        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn upsert(
        &self,
        session: &SyncSession,
        table: CollectionName,
        rows: Vec<Value>,
    ) -> Result<(), SyncError> {
        self.begin_request().await?;

        if rows
            .iter()
            .any(|row| row_str(row, "user_id") != Some(session.user_id()))
        {
            return Err(SyncError::ApiError(format!(
                "row-level security violation on {}",
                table
            )));
        }

        let mut tables = self.tables();
        for row in rows {
            let Some(id) = row_str(&row, "id").map(str::to_string) else {
                return Err(SyncError::ApiError("row without id".to_string()));
            };
            tables.upserts.push(UpsertRecord {
                session_user: session.user_id().to_string(),
                table,
                id: id.clone(),
            });
            tables.rows.entry(table).or_default().insert(id, row);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WriteContext;
    use serde_json::json;

    fn session(user: &str) -> SyncSession {
        SyncSession::new(
            WriteContext {
                user_id: user.to_string(),
                epoch: 1,
            },
            None,
        )
    }

    #[tokio::test]
    async fn test_select_since_filters_owner_and_cursor() {
        let backend = MemoryBackend::new();
        backend.put_row(
            CollectionName::Exercises,
            json!({"id": "a", "user_id": "u-1", "updated_at": "2026-01-01T00:00:00Z"}),
        );
        backend.put_row(
            CollectionName::Exercises,
            json!({"id": "b", "user_id": "u-1", "updated_at": "2026-01-03T00:00:00Z"}),
        );
        backend.put_row(
            CollectionName::Exercises,
            json!({"id": "c", "user_id": "u-2", "updated_at": "2026-01-03T00:00:00Z"}),
        );

        let all = backend
            .select_since(&session("u-1"), CollectionName::Exercises, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let since = DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let newer = backend
            .select_since(&session("u-1"), CollectionName::Exercises, Some(since))
            .await
            .unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_upsert_rejects_foreign_rows() {
        let backend = MemoryBackend::new();
        let err = backend
            .upsert(
                &session("u-2"),
                CollectionName::SetLogs,
                vec![json!({"id": "x", "user_id": "u-1"})],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::ApiError(_)));
        assert!(backend.rows(CollectionName::SetLogs).is_empty());
    }

    #[tokio::test]
    async fn test_injected_failure_is_consumed_once() {
        let backend = MemoryBackend::new();
        backend.fail_next(SyncError::RateLimited);

        let s = session("u-1");
        assert_eq!(
            backend.select_since(&s, CollectionName::Programs, None).await,
            Err(SyncError::RateLimited)
        );
        assert!(backend.select_since(&s, CollectionName::Programs, None).await.is_ok());
        assert_eq!(backend.request_count(), 2);
    }
}
