//! Sync controller: gates every collection between `Disabled` and `Enabled`
//! and runs pull/push rounds while enabled.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{RemoteBackend, SyncError, SyncSession};
use crate::model::CollectionName;
use crate::storage::SyncSettings;
use crate::store::Store;

/// Sync state of one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// Pure local store; no network calls
    #[default]
    Disabled,
    /// Local writes are pushed and remote changes pulled
    Enabled,
}

/// Failure while syncing one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSyncError {
    pub collection: CollectionName,
    pub error: SyncError,
}

/// Outcome of one pull-then-push round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Remote rows received
    pub pulled: usize,
    /// Remote rows that replaced or inserted local records
    pub merged: usize,
    /// Remote rows where the local copy won
    pub kept_local: usize,
    /// Local rows acknowledged by the remote
    pub pushed: usize,
    /// Pending rows owned by another identity, left queued
    pub skipped: usize,
    pub errors: Vec<CollectionSyncError>,
    /// The session changed mid-round; remaining work was abandoned
    pub stale: bool,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && !self.stale
    }

    /// Whether every error is worth retrying.
    pub fn is_transient_failure(&self) -> bool {
        !self.errors.is_empty() && self.errors.iter().all(|e| e.error.is_transient())
    }

    fn record(&mut self, collection: CollectionName, error: SyncError) {
        tracing::warn!("Sync of {} failed: {}", collection, error);
        self.errors.push(CollectionSyncError { collection, error });
    }
}

#[derive(Default)]
struct ControlState {
    session: Option<SyncSession>,
    statuses: BTreeMap<CollectionName, SyncStatus>,
    last_round_failed: bool,
}

struct Shared<B> {
    store: Store,
    backend: Arc<B>,
    settings: SyncSettings,
    state: Mutex<ControlState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Drives synchronization between the store and a [`RemoteBackend`].
pub struct SyncController<B: RemoteBackend> {
    shared: Arc<Shared<B>>,
}

impl<B: RemoteBackend> Clone for SyncController<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: RemoteBackend> SyncController<B> {
    /// Create a controller with every collection disabled.
    pub fn new(store: Store, backend: Arc<B>, settings: SyncSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                backend,
                settings,
                state: Mutex::new(ControlState::default()),
                worker: Mutex::new(None),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ControlState> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.shared.backend
    }

    /// Current status of one collection.
    pub fn status(&self, collection: CollectionName) -> SyncStatus {
        self.state()
            .statuses
            .get(&collection)
            .copied()
            .unwrap_or_default()
    }

    /// Whether any collection is enabled.
    pub fn is_enabled(&self) -> bool {
        self.state().session.is_some()
    }

    /// The session sync currently runs under.
    pub fn session(&self) -> Option<SyncSession> {
        self.state().session.clone()
    }

    /// Whether `session` is still the one sync is enabled for.
    fn is_current(&self, session: &SyncSession) -> bool {
        self.state().session.as_ref() == Some(session)
            && self.shared.store.identity().is_current(&session.context)
    }

    /// Enable every collection for `session` and run the initial round.
    ///
    /// Errors from the initial round are reported, not raised; the worker
    /// retries them.
    pub async fn enable_all(&self, session: SyncSession) -> Result<SyncReport, SyncError> {
        if session.context.is_placeholder() {
            return Err(SyncError::AuthorizationRequired);
        }
        if !self.shared.store.identity().is_current(&session.context) {
            return Err(SyncError::StaleSession);
        }

        {
            let mut state = self.state();
            state.session = Some(session.clone());
            for name in CollectionName::ALL {
                state.statuses.insert(name, SyncStatus::Enabled);
            }
        }
        tracing::info!("Sync enabled for {}", session.user_id());

        Ok(self.run_round(&session).await)
    }

    /// Disable every collection and stop the worker.
    ///
    /// In-flight requests finish, but their results are discarded.
    pub fn disable_all(&self) {
        {
            let mut state = self.state();
            state.session = None;
            state.last_round_failed = false;
            for name in CollectionName::ALL {
                state.statuses.insert(name, SyncStatus::Disabled);
            }
        }

        if let Some(handle) = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        tracing::info!("Sync disabled");
    }

    /// Run one pull-then-push round now.
    pub async fn sync_now(&self) -> Result<SyncReport, SyncError> {
        let session = self.session().ok_or(SyncError::Disabled)?;
        Ok(self.run_round(&session).await)
    }

    /// Spawn the background worker on the current tokio runtime.
    pub fn start(&self) -> Result<(), SyncError> {
        let session = self.session().ok_or(SyncError::Disabled)?;

        let mut worker = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = worker.take() {
            previous.abort();
        }

        let controller = self.clone();
        *worker = Some(tokio::spawn(async move {
            controller.run_worker(session).await;
        }));

        Ok(())
    }

    async fn run_worker(self, session: SyncSession) {
        let settings = self.shared.settings.clone();
        let poll = Duration::from_millis(settings.realtime_poll_ms.max(1));
        let mut backoff_ms = if self.state().last_round_failed {
            Some(settings.next_backoff(0))
        } else {
            None
        };

        tracing::debug!("Sync worker started for {}", session.user_id());

        loop {
            match backoff_ms {
                Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                None => {
                    tokio::select! {
                        _ = self.shared.store.local_write() => {}
                        _ = tokio::time::sleep(poll) => {}
                    }
                }
            }

            if !self.is_current(&session) {
                break;
            }

            let report = self.run_round(&session).await;
            if report.stale {
                break;
            }

            backoff_ms = if report.errors.is_empty() {
                None
            } else {
                let next = settings.next_backoff(backoff_ms.unwrap_or(0));
                tracing::warn!(
                    "Sync round had {} error(s); retrying in {} ms",
                    report.errors.len(),
                    next
                );
                Some(next)
            };
        }

        tracing::debug!("Sync worker for {} stopped", session.user_id());
    }

    async fn run_round(&self, session: &SyncSession) -> SyncReport {
        let mut report = SyncReport::default();

        for name in CollectionName::ALL {
            if self.status(name) != SyncStatus::Enabled {
                continue;
            }

            if let Err(e) = self.pull(session, name, &mut report).await {
                if e == SyncError::StaleSession {
                    report.stale = true;
                    break;
                }
                report.record(name, e);
                continue;
            }

            if let Err(e) = self.push(session, name, &mut report).await {
                if e == SyncError::StaleSession {
                    report.stale = true;
                    break;
                }
                report.record(name, e);
            }
        }

        if report.stale {
            tracing::info!("Sync round for {} abandoned: session changed", session.user_id());
        } else {
            self.state().last_round_failed = !report.errors.is_empty();
            tracing::debug!(
                "Sync round: pulled {}, merged {}, pushed {}, skipped {}",
                report.pulled,
                report.merged,
                report.pushed,
                report.skipped
            );
        }

        report
    }

    async fn pull(
        &self,
        session: &SyncSession,
        name: CollectionName,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let since = self.shared.store.cursor_for(name, session.user_id());
        let rows = self.shared.backend.poll_changes(session, name, since).await?;

        if !self.is_current(session) {
            return Err(SyncError::StaleSession);
        }
        if rows.is_empty() {
            return Ok(());
        }

        report.pulled += rows.len();
        let merge = self
            .shared
            .store
            .apply_remote(name, rows, &session.context)?;
        report.merged += merge.applied.len();
        report.kept_local += merge.kept_local;

        if merge.rejected > 0 {
            report.record(
                name,
                SyncError::SerializationError(format!("{} remote row(s) rejected", merge.rejected)),
            );
        }

        Ok(())
    }

    async fn push(
        &self,
        session: &SyncSession,
        name: CollectionName,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let limit = self.shared.settings.push_batch_size.max(1);
        let mut first = true;

        loop {
            let batch = self.shared.store.push_batch(name, session.user_id(), limit);
            if first {
                report.skipped += batch.foreign;
                first = false;
            }
            if batch.rows.is_empty() {
                return Ok(());
            }

            if !self.is_current(session) {
                return Err(SyncError::StaleSession);
            }

            let (acks, rows): (Vec<_>, Vec<_>) = batch
                .rows
                .into_iter()
                .map(|(id, updated_at, row)| ((id, updated_at), row))
                .unzip();
            let count = rows.len();

            self.shared.backend.upsert(session, name, rows).await?;

            let removed = self.shared.store.ack_pushed(name, &acks);
            report.pushed += removed;
            tracing::debug!("Pushed {} {} row(s), {} acknowledged", count, name, removed);

            // Everything re-dirtied during the request; the next round retries.
            if removed == 0 {
                return Ok(());
            }
        }
    }
}
