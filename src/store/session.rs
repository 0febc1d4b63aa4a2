//! Active workout session state.
//!
//! The in-progress session survives restarts through three standalone
//! `app_state` entries: the session id, the composed day ids and the ad-hoc
//! exercise ids.

use chrono::Utc;
use uuid::Uuid;

use crate::model::{SessionWorkoutDay, SetLog, WriteContext, WorkoutSession};
use crate::storage::database::Database;
use crate::storage::schema::{
    ACTIVE_ADHOC_EXERCISE_IDS_KEY, ACTIVE_SESSION_DAY_IDS_KEY, ACTIVE_SESSION_ID_KEY,
};
use crate::store::crud::SetLogDraft;
use crate::store::{Entry, Store, StoreError};

/// The workout currently being performed, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: Option<Uuid>,
    pub day_ids: Vec<Uuid>,
    pub adhoc_exercise_ids: Vec<Uuid>,
}

impl ActiveSession {
    pub fn is_active(&self) -> bool {
        self.session_id.is_some()
    }

    pub(crate) fn load(db: &Database) -> Result<Self, StoreError> {
        let session_id = match db.load_state(ACTIVE_SESSION_ID_KEY)? {
            Some(json) => serde_json::from_str::<Option<Uuid>>(&json)?,
            None => None,
        };
        let day_ids = match db.load_state(ACTIVE_SESSION_DAY_IDS_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        let adhoc_exercise_ids = match db.load_state(ACTIVE_ADHOC_EXERCISE_IDS_KEY)? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };

        Ok(Self {
            session_id,
            day_ids,
            adhoc_exercise_ids,
        })
    }

    pub(crate) fn save(&self, db: &Database) -> Result<(), StoreError> {
        db.save_state(
            ACTIVE_SESSION_ID_KEY,
            &serde_json::to_string(&self.session_id)?,
        )?;
        db.save_state(
            ACTIVE_SESSION_DAY_IDS_KEY,
            &serde_json::to_string(&self.day_ids)?,
        )?;
        db.save_state(
            ACTIVE_ADHOC_EXERCISE_IDS_KEY,
            &serde_json::to_string(&self.adhoc_exercise_ids)?,
        )?;
        Ok(())
    }
}

impl Store {
    /// Snapshot of the active session state.
    pub fn active_session(&self) -> ActiveSession {
        self.lock_state().active.clone()
    }

    /// Start a session over `day_ids`, or return the one already running.
    pub fn start_session(
        &self,
        ctx: &WriteContext,
        day_ids: &[Uuid],
        adhoc_exercise_ids: &[Uuid],
    ) -> Result<Uuid, StoreError> {
        if let Some(existing) = self.lock_state().active.session_id {
            tracing::debug!("Session {} already active", existing);
            return Ok(existing);
        }

        let workout_day_id = match day_ids {
            [single] => Some(*single),
            _ => None,
        };
        let session_id = self.add_workout_session(ctx, workout_day_id)?;

        let mut link_ids = Vec::with_capacity(day_ids.len());
        for (order, day_id) in day_ids.iter().enumerate() {
            match self.add_session_workout_day(ctx, session_id, *day_id, order as u32) {
                Ok(id) => link_ids.push(id),
                Err(e) => {
                    tracing::warn!("Session {} could not link its days: {}", session_id, e);
                    self.discard_session(&session_id, &link_ids);
                    return Err(e);
                }
            }
        }

        self.replace_active(ActiveSession {
            session_id: Some(session_id),
            day_ids: day_ids.to_vec(),
            adhoc_exercise_ids: adhoc_exercise_ids.to_vec(),
        });

        tracing::info!("Started session {} over {} day(s)", session_id, day_ids.len());
        Ok(session_id)
    }

    /// Log a set against the active session. `None` when no session is running.
    pub fn log_set(
        &self,
        ctx: &WriteContext,
        draft: SetLogDraft,
    ) -> Result<Option<Uuid>, StoreError> {
        let Some(session_id) = self.lock_state().active.session_id else {
            tracing::debug!("No active session; set not logged");
            return Ok(None);
        };

        self.add_set_log(ctx, session_id, draft).map(Some)
    }

    /// Finish the active session and clear the active state.
    pub fn end_session(&self, notes: Option<&str>) -> Result<Option<Uuid>, StoreError> {
        let session_id = self.lock_state().active.session_id;

        if let Some(id) = session_id {
            if self.get::<WorkoutSession>(&id).is_some() {
                self.set_field::<WorkoutSession>(&id, "completed_at", Utc::now())?;
                if let Some(notes) = notes {
                    self.set_field::<WorkoutSession>(&id, "notes", notes)?;
                }
            } else {
                tracing::warn!("Active session {} no longer exists", id);
            }
        }

        self.replace_active(ActiveSession::default());
        Ok(session_id)
    }

    /// Sets logged so far in the active session.
    pub fn active_session_logs(&self) -> Vec<SetLog> {
        let Some(session_id) = self.lock_state().active.session_id else {
            return Vec::new();
        };
        self.view(|c| {
            c.set_logs
                .live()
                .filter(|l| l.workout_session_id == session_id)
                .cloned()
                .collect()
        })
    }

    /// Tombstone a session that failed to start, with the links made so far.
    fn discard_session(&self, session_id: &Uuid, link_ids: &[Uuid]) {
        for id in link_ids {
            if let Err(e) = self.soft_delete::<SessionWorkoutDay>(id) {
                tracing::error!("Failed to discard session link {}: {}", id, e);
            }
        }
        if let Err(e) = self.soft_delete::<WorkoutSession>(session_id) {
            tracing::error!("Failed to discard session {}: {}", session_id, e);
        }
    }

    fn replace_active(&self, active: ActiveSession) {
        let mut state = self.lock_state();
        state.active = active;
        state.dirty.insert(Entry::ActiveSession);
        if let Err(e) = self.flush_locked(&mut state) {
            tracing::warn!("Persisting active session deferred: {}", e);
        }
    }
}
