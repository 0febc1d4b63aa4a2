//! Durable collection store.
//!
//! One [`Store`] instance owns every collection. Reads are synchronous and
//! never touch the database; every local mutation is applied in memory,
//! recorded in the pending-push outbox, written through to SQLite and then
//! announced on the change channel.

pub mod collection;
pub mod crud;
pub mod events;
pub mod session;

use std::collections::{BTreeMap, BTreeSet};
#[cfg(test)]
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use uuid::Uuid;

use crate::model::{CollectionName, IdentityRegister, Record, WriteContext};
use crate::storage::database::{Database, DatabaseError};
use crate::storage::schema::{PENDING_PUSH_KEY, SYNC_CURSORS_KEY};

pub use collection::{Collection, Collections, MergeDecision};
pub use crud::{ProgramDraft, SetDraft, SetLogDraft, TemplateItemDraft};
pub use events::{ChangeEvent, ChangeOrigin, DerivedView};
pub use session::ActiveSession;

/// Attempts per persisted entry before it is left dirty for a later flush.
const PERSIST_ATTEMPTS: usize = 3;

/// Capacity of the change broadcast channel.
const EVENT_CAPACITY: usize = 256;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Record not found: {collection} {id}")]
    NotFound { collection: CollectionName, id: Uuid },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Identity changed since the operation started")]
    StaleIdentity,

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// A record waiting to be pushed to the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingKey {
    pub collection: CollectionName,
    pub id: Uuid,
}

/// Live and total record counts of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionCount {
    pub collection: CollectionName,
    pub live: usize,
    pub total: usize,
}

/// Result of merging a batch of remote rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMerge {
    /// Rows inserted or replacing the local copy
    pub applied: Vec<Uuid>,
    /// Rows where the local copy won
    pub kept_local: usize,
    /// Rows that could not be decoded
    pub rejected: usize,
}

/// Rows selected for one push request.
#[derive(Debug, Clone, Default)]
pub(crate) struct PushBatch {
    /// `(id, updated_at at selection time, row)`
    pub rows: Vec<(Uuid, DateTime<Utc>, Value)>,
    /// Pending rows owned by another identity
    pub foreign: usize,
}

/// Persisted entries that may need writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Entry {
    Collection(CollectionName),
    Outbox,
    Cursors,
    ActiveSession,
}

/// Persisted form of the sync cursors.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CursorSnapshot {
    /// User the cursors were collected for
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    cursors: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Default)]
struct StoreState {
    collections: Collections,
    outbox: BTreeSet<PendingKey>,
    cursors: BTreeMap<CollectionName, DateTime<Utc>>,
    cursor_owner: Option<String>,
    active: ActiveSession,
    dirty: BTreeSet<Entry>,
    batch_depth: usize,
    persistence_suspended: bool,
    #[cfg(test)]
    failing_ids: HashSet<Uuid>,
    #[cfg(test)]
    failing_collections: HashSet<CollectionName>,
}

impl StoreState {
    #[cfg(test)]
    fn check_injected_failure(&self, name: CollectionName, id: &Uuid) -> Result<(), StoreError> {
        if self.failing_ids.contains(id) || self.failing_collections.contains(&name) {
            return Err(StoreError::WriteFailed(format!("injected failure for {}", id)));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check_injected_failure(&self, _name: CollectionName, _id: &Uuid) -> Result<(), StoreError> {
        Ok(())
    }
}

struct StoreInner {
    state: Mutex<StoreState>,
    db: Mutex<Option<Database>>,
    identity: IdentityRegister,
    events: broadcast::Sender<ChangeEvent>,
    local_writes: Notify,
}

/// Guard returned by [`Store::batch`].
pub struct WriteBatch<'a> {
    store: &'a Store,
}

impl Drop for WriteBatch<'_> {
    fn drop(&mut self) {
        let mut state = self.store.lock_state();
        state.batch_depth = state.batch_depth.saturating_sub(1);
        if state.batch_depth == 0 {
            if let Err(e) = self.store.flush_locked(&mut state) {
                tracing::warn!("Persisting batched writes deferred: {}", e);
            }
        }
    }
}

/// Shared handle to the collections; cheap to clone.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open the store over a database, restoring every persisted entry.
    pub fn open(db: Database) -> Result<Self, StoreError> {
        let mut state = StoreState::default();

        for name in CollectionName::ALL {
            if let Some(json) = db.load_collection(name.as_str())? {
                state.collections.load_json(name, &json)?;
            }
        }

        if let Some(json) = db.load_state(PENDING_PUSH_KEY)? {
            let keys: Vec<PendingKey> = serde_json::from_str(&json)?;
            state.outbox = keys.into_iter().collect();
        }

        if let Some(json) = db.load_state(SYNC_CURSORS_KEY)? {
            let snapshot: CursorSnapshot = serde_json::from_str(&json)?;
            state.cursor_owner = snapshot.owner;
            state.cursors = snapshot
                .cursors
                .into_iter()
                .filter_map(|(name, at)| CollectionName::from_name(&name).map(|c| (c, at)))
                .collect();
        }

        state.active = ActiveSession::load(&db)?;

        tracing::info!(
            "Store opened: {} pending pushes, active session: {}",
            state.outbox.len(),
            state.active.session_id.is_some()
        );

        Ok(Self::from_parts(state, Some(db)))
    }

    /// Open a store over a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(Database::open_in_memory()?)
    }

    fn from_parts(state: StoreState, db: Option<Database>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(state),
                db: Mutex::new(db),
                identity: IdentityRegister::new(),
                events,
                local_writes: Notify::new(),
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_db(&self) -> MutexGuard<'_, Option<Database>> {
        self.inner.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Identity & Notifications ==========

    /// The identity register shared by every writer.
    pub fn identity(&self) -> &IdentityRegister {
        &self.inner.identity
    }

    /// Snapshot of the current identity for a write.
    pub fn context(&self) -> WriteContext {
        self.inner.identity.context()
    }

    /// Subscribe to change events.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until a local mutation happens.
    pub async fn local_write(&self) {
        self.inner.local_writes.notified().await;
    }

    fn announce(&self, event: ChangeEvent) {
        if event.origin == ChangeOrigin::Local {
            self.inner.local_writes.notify_one();
        }
        // No receivers is fine
        let _ = self.inner.events.send(event);
    }

    // ========== Reads ==========

    /// Run a read-only closure over all collections.
    pub fn view<R>(&self, f: impl FnOnce(&Collections) -> R) -> R {
        let state = self.lock_state();
        f(&state.collections)
    }

    /// Get a record by id, tombstones included.
    pub fn get<T: Record>(&self, id: &Uuid) -> Option<T> {
        self.view(|c| c.of::<T>().get(id).cloned())
    }

    /// Get a record by id unless it is tombstoned.
    pub fn get_live<T: Record>(&self, id: &Uuid) -> Option<T> {
        self.view(|c| c.of::<T>().get_live(id).cloned())
    }

    /// All non-deleted records of a type.
    pub fn live<T: Record>(&self) -> Vec<T> {
        self.view(|c| c.of::<T>().live().cloned().collect())
    }

    /// Record counts per collection.
    pub fn counts(&self) -> Vec<CollectionCount> {
        self.view(|c| {
            CollectionName::ALL
                .into_iter()
                .map(|name| {
                    let (live, total) = c.erased(name).counts();
                    CollectionCount {
                        collection: name,
                        live,
                        total,
                    }
                })
                .collect()
        })
    }

    // ========== Local Mutations ==========

    /// Insert a new record owned by `ctx`.
    pub fn insert<T: Record>(&self, ctx: &WriteContext, mut record: T) -> Result<Uuid, StoreError> {
        let now = Utc::now();
        {
            let meta = record.meta_mut();
            meta.user_id = ctx.user_id.clone();
            meta.created_at = now;
            meta.updated_at = now;
            meta.deleted = false;
        }
        let id = record.id();

        {
            let mut state = self.lock_state();
            state.check_injected_failure(T::COLLECTION, &id)?;

            let collection = state.collections.of_mut::<T>();
            if collection.contains(&id) {
                return Err(StoreError::Validation(format!(
                    "{} {} already exists",
                    T::COLLECTION,
                    id
                )));
            }
            collection.put(record);
            self.commit_local(&mut state, T::COLLECTION, id);
        }

        self.announce(ChangeEvent::local(T::COLLECTION, vec![id]));
        Ok(id)
    }

    /// Create-or-merge fields into record `id`. Never removes a record.
    ///
    /// Creating requires the patch to carry every non-optional field; the
    /// owner and timestamps are stamped from `ctx`.
    pub fn assign<T: Record>(
        &self,
        ctx: &WriteContext,
        id: Uuid,
        patch: Value,
    ) -> Result<(), StoreError> {
        let Value::Object(mut fields) = patch else {
            return Err(StoreError::Validation("patch must be a JSON object".to_string()));
        };
        let now = Utc::now();

        {
            let mut state = self.lock_state();
            state.check_injected_failure(T::COLLECTION, &id)?;

            let collection = state.collections.of_mut::<T>();
            if collection.contains(&id) {
                collection.merge_patch(&id, fields, now)?;
            } else {
                fields.insert("id".to_string(), Value::String(id.to_string()));
                fields.insert("user_id".to_string(), Value::String(ctx.user_id.clone()));
                fields.insert("created_at".to_string(), serde_json::to_value(now)?);
                fields.insert("updated_at".to_string(), serde_json::to_value(now)?);
                fields.entry("deleted").or_insert(Value::Bool(false));

                let record: T = serde_json::from_value(Value::Object(fields))?;
                collection.put(record);
            }
            self.commit_local(&mut state, T::COLLECTION, id);
        }

        self.announce(ChangeEvent::local(T::COLLECTION, vec![id]));
        Ok(())
    }

    /// Mutate a single field of an existing record.
    pub fn set_field<T: Record>(
        &self,
        id: &Uuid,
        field: &str,
        value: impl Serialize,
    ) -> Result<(), StoreError> {
        let mut patch = Map::new();
        patch.insert(field.to_string(), serde_json::to_value(value)?);
        self.patch_existing(T::COLLECTION, id, patch)
    }

    /// Tombstone a record. Returns false when it was already deleted.
    pub fn soft_delete<T: Record>(&self, id: &Uuid) -> Result<bool, StoreError> {
        let already = self
            .view(|c| c.of::<T>().get(id).map(|r| r.is_deleted()))
            .ok_or(StoreError::NotFound {
                collection: T::COLLECTION,
                id: *id,
            })?;

        if already {
            return Ok(false);
        }

        self.set_field::<T>(id, "deleted", true)?;
        Ok(true)
    }

    fn patch_existing(
        &self,
        name: CollectionName,
        id: &Uuid,
        patch: Map<String, Value>,
    ) -> Result<(), StoreError> {
        {
            let mut state = self.lock_state();
            state.check_injected_failure(name, id)?;
            state
                .collections
                .erased_mut(name)
                .patch(id, patch, Utc::now())?;
            self.commit_local(&mut state, name, *id);
        }

        self.announce(ChangeEvent::local(name, vec![*id]));
        Ok(())
    }

    fn commit_local(&self, state: &mut StoreState, name: CollectionName, id: Uuid) {
        state.outbox.insert(PendingKey {
            collection: name,
            id,
        });
        state.dirty.insert(Entry::Collection(name));
        state.dirty.insert(Entry::Outbox);

        if state.batch_depth > 0 {
            return;
        }
        if let Err(e) = self.flush_locked(state) {
            tracing::warn!("Persisting {} deferred: {}", name, e);
        }
    }

    /// Defer write-through of local mutations until the returned guard drops.
    ///
    /// Batches nest; the outermost guard writes every dirty entry once.
    pub fn batch(&self) -> WriteBatch<'_> {
        self.lock_state().batch_depth += 1;
        WriteBatch { store: self }
    }

    // ========== Ownership ==========

    /// Ids in a collection still owned by the local placeholder.
    pub(crate) fn placeholder_owned(&self, name: CollectionName) -> Vec<Uuid> {
        self.view(|c| c.erased(name).placeholder_owned())
    }

    /// Reassign the owner of one record. Returns false when already owned.
    pub(crate) fn reassign_owner(
        &self,
        name: CollectionName,
        id: &Uuid,
        user_id: &str,
    ) -> Result<bool, StoreError> {
        let owner = self
            .view(|c| c.erased(name).owner_of(id))
            .ok_or(StoreError::NotFound {
                collection: name,
                id: *id,
            })?;

        if owner == user_id {
            return Ok(false);
        }

        let mut patch = Map::new();
        patch.insert("user_id".to_string(), Value::String(user_id.to_string()));
        self.patch_existing(name, id, patch)?;
        Ok(true)
    }

    // ========== Sync Support ==========

    /// Ids waiting to be pushed for a collection.
    pub fn pending(&self, name: CollectionName) -> Vec<Uuid> {
        let state = self.lock_state();
        state
            .outbox
            .iter()
            .filter(|k| k.collection == name)
            .map(|k| k.id)
            .collect()
    }

    /// Total number of records waiting to be pushed.
    pub fn pending_len(&self) -> usize {
        self.lock_state().outbox.len()
    }

    /// Last remote `updated_at` merged for a collection.
    pub fn cursor(&self, name: CollectionName) -> Option<DateTime<Utc>> {
        self.lock_state().cursors.get(&name).copied()
    }

    /// Cursor to pull from for `user_id`. Cursors collected for another user
    /// do not apply.
    pub fn cursor_for(&self, name: CollectionName, user_id: &str) -> Option<DateTime<Utc>> {
        let state = self.lock_state();
        if state.cursor_owner.as_deref() != Some(user_id) {
            return None;
        }
        state.cursors.get(&name).copied()
    }

    /// Select pending rows owned by `user_id`, at most `limit`.
    pub(crate) fn push_batch(&self, name: CollectionName, user_id: &str, limit: usize) -> PushBatch {
        let state = self.lock_state();
        let collection = state.collections.erased(name);
        let mut batch = PushBatch::default();

        for key in state.outbox.iter().filter(|k| k.collection == name) {
            if batch.rows.len() >= limit {
                break;
            }
            if collection.owner_of(&key.id).as_deref() != Some(user_id) {
                batch.foreign += 1;
                continue;
            }
            let (Some(updated_at), Ok(Some(row))) =
                (collection.updated_at(&key.id), collection.record_value(&key.id))
            else {
                continue;
            };
            batch.rows.push((key.id, updated_at, row));
        }

        batch
    }

    /// Drop acknowledged rows from the outbox unless they changed since selection.
    pub(crate) fn ack_pushed(&self, name: CollectionName, acked: &[(Uuid, DateTime<Utc>)]) -> usize {
        let mut state = self.lock_state();
        let mut removed = 0;

        for (id, snapshot) in acked {
            let unchanged = state.collections.erased(name).updated_at(id) == Some(*snapshot);
            if unchanged
                && state.outbox.remove(&PendingKey {
                    collection: name,
                    id: *id,
                })
            {
                removed += 1;
            }
        }

        if removed > 0 {
            state.dirty.insert(Entry::Outbox);
            if let Err(e) = self.flush_locked(&mut state) {
                tracing::warn!("Persisting outbox deferred: {}", e);
            }
        }

        removed
    }

    /// Merge remote rows captured under `session`.
    ///
    /// Rows are discarded with [`StoreError::StaleIdentity`] when the identity
    /// changed after the request started.
    pub(crate) fn apply_remote(
        &self,
        name: CollectionName,
        rows: Vec<Value>,
        session: &WriteContext,
    ) -> Result<RemoteMerge, StoreError> {
        let mut merge = RemoteMerge::default();

        {
            let mut state = self.lock_state();
            if !self.inner.identity.is_current(session) {
                return Err(StoreError::StaleIdentity);
            }

            if state.cursor_owner.as_deref() != Some(session.user_id.as_str()) {
                tracing::info!("Resetting sync cursors for {}", session.user_id);
                state.cursors.clear();
                state.cursor_owner = Some(session.user_id.clone());
                state.dirty.insert(Entry::Cursors);
            }

            let mut cursor = state.cursors.get(&name).copied();

            for row in rows {
                let row_updated_at = row
                    .get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|d| d.with_timezone(&Utc));

                let merged = state.collections.erased_mut(name).merge_remote_value(row);
                match merged {
                    Ok((id, MergeDecision::Inserted | MergeDecision::Replaced)) => {
                        state.outbox.remove(&PendingKey { collection: name, id });
                        merge.applied.push(id);
                    }
                    Ok((_, MergeDecision::KeptLocal)) => merge.kept_local += 1,
                    Err(e) => {
                        tracing::warn!("Rejected remote {} row: {}", name, e);
                        merge.rejected += 1;
                        continue;
                    }
                }

                if let Some(at) = row_updated_at {
                    cursor = Some(cursor.map_or(at, |c| c.max(at)));
                }
            }

            if let Some(at) = cursor {
                state.cursors.insert(name, at);
                state.dirty.insert(Entry::Cursors);
            }
            if !merge.applied.is_empty() {
                state.dirty.insert(Entry::Collection(name));
                state.dirty.insert(Entry::Outbox);
            }
            if let Err(e) = self.flush_locked(&mut state) {
                tracing::warn!("Persisting remote {} merge deferred: {}", name, e);
            }
        }

        if !merge.applied.is_empty() {
            self.announce(ChangeEvent::remote(name, merge.applied.clone()));
        }

        Ok(merge)
    }

    // ========== Persistence ==========

    /// Write every dirty entry now, propagating the failure if any remains.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut state = self.lock_state();
        self.flush_locked(&mut state)
    }

    fn flush_locked(&self, state: &mut StoreState) -> Result<(), StoreError> {
        if state.persistence_suspended {
            state.dirty.clear();
            return Ok(());
        }

        let db_guard = self.lock_db();
        let Some(db) = db_guard.as_ref() else {
            state.dirty.clear();
            return Ok(());
        };

        let mut last_error = None;
        let entries: Vec<Entry> = state.dirty.iter().copied().collect();

        for entry in entries {
            match Self::write_entry(db, state, entry) {
                Ok(()) => {
                    state.dirty.remove(&entry);
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn write_entry(db: &Database, state: &StoreState, entry: Entry) -> Result<(), StoreError> {
        let mut attempt = 1;
        loop {
            match Self::write_entry_once(db, state, entry) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < PERSIST_ATTEMPTS => {
                    tracing::debug!("Retrying write of {:?} (attempt {}): {}", entry, attempt, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn write_entry_once(db: &Database, state: &StoreState, entry: Entry) -> Result<(), StoreError> {
        match entry {
            Entry::Collection(name) => {
                let json = state.collections.erased(name).to_json()?;
                db.save_collection(name.as_str(), &json)?;
            }
            Entry::Outbox => {
                let keys: Vec<&PendingKey> = state.outbox.iter().collect();
                db.save_state(PENDING_PUSH_KEY, &serde_json::to_string(&keys)?)?;
            }
            Entry::Cursors => {
                let snapshot = CursorSnapshot {
                    owner: state.cursor_owner.clone(),
                    cursors: state
                        .cursors
                        .iter()
                        .map(|(name, at)| (name.as_str().to_string(), *at))
                        .collect(),
                };
                db.save_state(SYNC_CURSORS_KEY, &serde_json::to_string(&snapshot)?)?;
            }
            Entry::ActiveSession => state.active.save(db)?,
        }
        Ok(())
    }

    /// Wipe all locally persisted collection data, keeping auth storage.
    ///
    /// In-memory data stays readable but nothing is persisted again until the
    /// process restarts and reloads from the now-empty database.
    pub fn clear_local_cache(&self) -> Result<(), StoreError> {
        let mut state = self.lock_state();
        let mut db_guard = self.lock_db();

        if let Some(db) = db_guard.as_mut() {
            db.clear_local_cache()?;
        }

        state.persistence_suspended = true;
        state.dirty.clear();
        tracing::warn!("Local cache cleared; restart required to reinitialize");

        Ok(())
    }

    /// Whether persistence is suspended after a cache clear.
    pub fn needs_restart(&self) -> bool {
        self.lock_state().persistence_suspended
    }

    // ========== Auth Storage ==========

    /// Save an authentication entry (never touched by cache clearing).
    pub fn save_auth_state(&self, key: &str, value_json: &str) -> Result<(), StoreError> {
        if let Some(db) = self.lock_db().as_ref() {
            db.save_auth_state(key, value_json)?;
        }
        Ok(())
    }

    /// Load an authentication entry.
    pub fn load_auth_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.lock_db().as_ref() {
            Some(db) => Ok(db.load_auth_state(key)?),
            None => Ok(None),
        }
    }

    /// Remove an authentication entry.
    pub fn delete_auth_state(&self, key: &str) -> Result<(), StoreError> {
        if let Some(db) = self.lock_db().as_ref() {
            db.delete_auth_state(key)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn fail_writes_for(&self, id: Uuid) {
        self.lock_state().failing_ids.insert(id);
    }

    #[cfg(test)]
    pub(crate) fn fail_writes_to(&self, name: CollectionName) {
        self.lock_state().failing_collections.insert(name);
    }
}
