//! Keyed in-memory collections.
//!
//! A [`Collection`] maps record ids to typed records. Tombstoned records stay
//! in the map so cascades and merges can still address them; read paths go
//! through [`Collection::live`], which filters them out.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::{
    is_placeholder_owner, CollectionName, Exercise, MaxLift, Program, ProgramWeek, Record,
    SessionWorkoutDay, SetLog, TemplateItem, WorkoutDay, WorkoutSession, WorkoutSet,
    WorkoutTemplate,
};
use crate::store::StoreError;

/// Outcome of merging one remote record into a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Record did not exist locally
    Inserted,
    /// Remote copy was newer (or a tombstone on a tie) and replaced the local one
    Replaced,
    /// Local copy was kept
    KeptLocal,
}

/// Records of one entity type keyed by id.
#[derive(Debug, Clone)]
pub struct Collection<T: Record> {
    records: BTreeMap<Uuid, T>,
}

impl<T: Record> Default for Collection<T> {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a record by id, including tombstones.
    pub fn get(&self, id: &Uuid) -> Option<&T> {
        self.records.get(id)
    }

    /// Get a record by id unless it is tombstoned.
    pub fn get_live(&self, id: &Uuid) -> Option<&T> {
        self.records.get(id).filter(|r| !r.is_deleted())
    }

    /// Non-deleted records.
    pub fn live(&self) -> impl Iterator<Item = &T> + '_ {
        self.records.values().filter(|r| !r.is_deleted())
    }

    /// Every record including tombstones.
    pub fn including_deleted(&self) -> impl Iterator<Item = &T> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn live_len(&self) -> usize {
        self.live().count()
    }

    pub(crate) fn contains(&self, id: &Uuid) -> bool {
        self.records.contains_key(id)
    }

    pub(crate) fn put(&mut self, record: T) {
        self.records.insert(record.id(), record);
    }

    /// Merge a JSON patch into an existing record. `id` is immutable.
    pub(crate) fn merge_patch(
        &mut self,
        id: &Uuid,
        mut patch: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let current = self.records.get(id).ok_or(StoreError::NotFound {
            collection: T::COLLECTION,
            id: *id,
        })?;

        if let Some(patch_id) = patch.remove("id") {
            if patch_id != Value::String(id.to_string()) {
                return Err(StoreError::Validation(format!(
                    "{} id is immutable",
                    T::COLLECTION
                )));
            }
        }

        let mut value = serde_json::to_value(current)?;
        if let Value::Object(fields) = &mut value {
            fields.extend(patch);
        }

        let mut updated: T = serde_json::from_value(value)?;
        updated.meta_mut().updated_at = now;
        self.records.insert(*id, updated);

        Ok(())
    }

    /// Last-write-wins merge of a remote copy; ties prefer the tombstone.
    pub(crate) fn merge_remote(&mut self, incoming: T) -> MergeDecision {
        let id = incoming.id();
        let Some(local) = self.records.get(&id) else {
            self.records.insert(id, incoming);
            return MergeDecision::Inserted;
        };

        let (l, r) = (local.meta(), incoming.meta());
        let remote_wins = r.updated_at > l.updated_at
            || (r.updated_at == l.updated_at && r.deleted && !l.deleted);

        if remote_wins {
            self.records.insert(id, incoming);
            MergeDecision::Replaced
        } else {
            MergeDecision::KeptLocal
        }
    }

    pub(crate) fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&self.records)?)
    }

    pub(crate) fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(Self {
            records: serde_json::from_str(json)?,
        })
    }
}

/// Type-erased view used where the collection is chosen at runtime
/// (persistence, sync, migration).
pub(crate) trait ErasedCollection: Send {
    fn placeholder_owned(&self) -> Vec<Uuid>;
    fn owner_of(&self, id: &Uuid) -> Option<String>;
    fn updated_at(&self, id: &Uuid) -> Option<DateTime<Utc>>;
    fn record_value(&self, id: &Uuid) -> Result<Option<Value>, StoreError>;
    fn patch(&mut self, id: &Uuid, patch: Map<String, Value>, now: DateTime<Utc>)
        -> Result<(), StoreError>;
    fn merge_remote_value(&mut self, value: Value) -> Result<(Uuid, MergeDecision), StoreError>;
    fn to_json(&self) -> Result<String, StoreError>;
    fn counts(&self) -> (usize, usize);
}

impl<T: Record> ErasedCollection for Collection<T> {
    fn placeholder_owned(&self) -> Vec<Uuid> {
        self.records
            .values()
            .filter(|r| is_placeholder_owner(&r.meta().user_id))
            .map(|r| r.id())
            .collect()
    }

    fn owner_of(&self, id: &Uuid) -> Option<String> {
        self.records.get(id).map(|r| r.meta().user_id.clone())
    }

    fn updated_at(&self, id: &Uuid) -> Option<DateTime<Utc>> {
        self.records.get(id).map(|r| r.meta().updated_at)
    }

    fn record_value(&self, id: &Uuid) -> Result<Option<Value>, StoreError> {
        self.records
            .get(id)
            .map(serde_json::to_value)
            .transpose()
            .map_err(StoreError::from)
    }

    fn patch(
        &mut self,
        id: &Uuid,
        patch: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.merge_patch(id, patch, now)
    }

    fn merge_remote_value(&mut self, value: Value) -> Result<(Uuid, MergeDecision), StoreError> {
        let record: T = serde_json::from_value(value)?;
        let id = record.id();
        Ok((id, self.merge_remote(record)))
    }

    fn to_json(&self) -> Result<String, StoreError> {
        Collection::to_json(self)
    }

    fn counts(&self) -> (usize, usize) {
        (self.live_len(), self.len())
    }
}

/// One collection per entity type.
#[derive(Debug, Clone, Default)]
pub struct Collections {
    pub exercises: Collection<Exercise>,
    pub max_lifts: Collection<MaxLift>,
    pub programs: Collection<Program>,
    pub program_weeks: Collection<ProgramWeek>,
    pub workout_days: Collection<WorkoutDay>,
    pub workout_sets: Collection<WorkoutSet>,
    pub workout_sessions: Collection<WorkoutSession>,
    pub set_logs: Collection<SetLog>,
    pub session_workout_days: Collection<SessionWorkoutDay>,
    pub workout_templates: Collection<WorkoutTemplate>,
    pub template_items: Collection<TemplateItem>,
}

impl Collections {
    /// Typed access by record type.
    pub fn of<T: Record>(&self) -> &Collection<T> {
        T::collection(self)
    }

    pub(crate) fn of_mut<T: Record>(&mut self) -> &mut Collection<T> {
        T::collection_mut(self)
    }

    pub(crate) fn erased(&self, name: CollectionName) -> &dyn ErasedCollection {
        match name {
            CollectionName::Exercises => &self.exercises,
            CollectionName::MaxLifts => &self.max_lifts,
            CollectionName::Programs => &self.programs,
            CollectionName::ProgramWeeks => &self.program_weeks,
            CollectionName::WorkoutDays => &self.workout_days,
            CollectionName::WorkoutSets => &self.workout_sets,
            CollectionName::WorkoutSessions => &self.workout_sessions,
            CollectionName::SetLogs => &self.set_logs,
            CollectionName::SessionWorkoutDays => &self.session_workout_days,
            CollectionName::WorkoutTemplates => &self.workout_templates,
            CollectionName::TemplateItems => &self.template_items,
        }
    }

    pub(crate) fn erased_mut(&mut self, name: CollectionName) -> &mut dyn ErasedCollection {
        match name {
            CollectionName::Exercises => &mut self.exercises,
            CollectionName::MaxLifts => &mut self.max_lifts,
            CollectionName::Programs => &mut self.programs,
            CollectionName::ProgramWeeks => &mut self.program_weeks,
            CollectionName::WorkoutDays => &mut self.workout_days,
            CollectionName::WorkoutSets => &mut self.workout_sets,
            CollectionName::WorkoutSessions => &mut self.workout_sessions,
            CollectionName::SetLogs => &mut self.set_logs,
            CollectionName::SessionWorkoutDays => &mut self.session_workout_days,
            CollectionName::WorkoutTemplates => &mut self.workout_templates,
            CollectionName::TemplateItems => &mut self.template_items,
        }
    }

    /// Replace one collection from its persisted JSON map.
    pub(crate) fn load_json(&mut self, name: CollectionName, json: &str) -> Result<(), StoreError> {
        match name {
            CollectionName::Exercises => self.exercises = Collection::from_json(json)?,
            CollectionName::MaxLifts => self.max_lifts = Collection::from_json(json)?,
            CollectionName::Programs => self.programs = Collection::from_json(json)?,
            CollectionName::ProgramWeeks => self.program_weeks = Collection::from_json(json)?,
            CollectionName::WorkoutDays => self.workout_days = Collection::from_json(json)?,
            CollectionName::WorkoutSets => self.workout_sets = Collection::from_json(json)?,
            CollectionName::WorkoutSessions => {
                self.workout_sessions = Collection::from_json(json)?
            }
            CollectionName::SetLogs => self.set_logs = Collection::from_json(json)?,
            CollectionName::SessionWorkoutDays => {
                self.session_workout_days = Collection::from_json(json)?
            }
            CollectionName::WorkoutTemplates => {
                self.workout_templates = Collection::from_json(json)?
            }
            CollectionName::TemplateItems => self.template_items = Collection::from_json(json)?,
        }
        Ok(())
    }
}
