//! Entity types stored in the local collections.
//!
//! Every entity embeds a [`RecordMeta`] carrying the change-tracking fields
//! shared with the remote tables: `id`, `user_id`, `created_at`, `updated_at`
//! and the `deleted` tombstone.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::store::collection::{Collection, Collections};

/// Name of a synchronized collection; doubles as the remote table name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionName {
    Exercises,
    MaxLifts,
    Programs,
    ProgramWeeks,
    WorkoutDays,
    WorkoutSets,
    WorkoutSessions,
    SetLogs,
    SessionWorkoutDays,
    WorkoutTemplates,
    TemplateItems,
}

impl CollectionName {
    /// Every collection, parents before children.
    pub const ALL: [CollectionName; 11] = [
        CollectionName::Exercises,
        CollectionName::MaxLifts,
        CollectionName::Programs,
        CollectionName::ProgramWeeks,
        CollectionName::WorkoutDays,
        CollectionName::WorkoutSets,
        CollectionName::WorkoutSessions,
        CollectionName::SetLogs,
        CollectionName::SessionWorkoutDays,
        CollectionName::WorkoutTemplates,
        CollectionName::TemplateItems,
    ];

    /// Storage key and remote table name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Exercises => "exercises",
            CollectionName::MaxLifts => "max_lifts",
            CollectionName::Programs => "programs",
            CollectionName::ProgramWeeks => "program_weeks",
            CollectionName::WorkoutDays => "workout_days",
            CollectionName::WorkoutSets => "workout_sets",
            CollectionName::WorkoutSessions => "workout_sessions",
            CollectionName::SetLogs => "set_logs",
            CollectionName::SessionWorkoutDays => "session_workout_days",
            CollectionName::WorkoutTemplates => "workout_templates",
            CollectionName::TemplateItems => "template_items",
        }
    }

    /// Look up a collection by its table name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treat an explicit JSON `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Change-tracking fields shared by every entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Client-generated, immutable
    pub id: Uuid,
    /// Owning identity (placeholder or authenticated id)
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: DateTime<Utc>,
    /// Tombstone; deleted records stay addressable by id
    #[serde(default, deserialize_with = "null_as_default")]
    pub deleted: bool,
}

impl RecordMeta {
    /// Fresh metadata with a new id; owner and timestamps are stamped on insert.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Metadata for a known id.
    pub fn with_id(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id: String::new(),
            created_at: now,
            updated_at: now,
            deleted: false,
        }
    }
}

impl Default for RecordMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A record stored in one of the typed collections.
pub trait Record: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection this record type lives in.
    const COLLECTION: CollectionName;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// The typed collection for this record inside the store.
    fn collection(collections: &Collections) -> &Collection<Self>;

    fn collection_mut(collections: &mut Collections) -> &mut Collection<Self>;

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn is_deleted(&self) -> bool {
        self.meta().deleted
    }
}

macro_rules! impl_record {
    ($ty:ident, $variant:ident, $field:ident) => {
        impl Record for $ty {
            const COLLECTION: CollectionName = CollectionName::$variant;

            fn meta(&self) -> &RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut RecordMeta {
                &mut self.meta
            }

            fn collection(collections: &Collections) -> &Collection<Self> {
                &collections.$field
            }

            fn collection_mut(collections: &mut Collections) -> &mut Collection<Self> {
                &mut collections.$field
            }
        }
    };
}

/// A lift or movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// Unique per user by convention only
    pub name: String,
    /// Free-form tag such as "squat" or "accessory"
    pub category: Option<String>,
}

/// A recorded one-rep max.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxLift {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub exercise_id: Uuid,
    pub weight_kg: f64,
    pub date_recorded: Option<DateTime<Utc>>,
}

/// A multi-week training program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub description: Option<String>,
    /// At least 1
    pub weeks_count: u32,
    /// 1..=weeks_count
    pub current_week: u32,
    pub start_date: Option<DateTime<Utc>>,
    /// Free-form tag such as "strength" or "custom"
    pub program_type: Option<String>,
    /// Opaque build specification from the program wizard
    pub wizard_config: Option<serde_json::Value>,
}

/// One week of a program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramWeek {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub program_id: Uuid,
    /// 1-based, unique per program
    pub week_number: u32,
}

/// One training day within a week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutDay {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub program_week_id: Uuid,
    /// 1-based
    pub day_number: u32,
    pub name: Option<String>,
}

/// A prescribed set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub workout_day_id: Uuid,
    pub exercise_id: Uuid,
    pub set_number: u32,
    pub reps: u32,
    /// Fraction in (0, 1]; `None` for accessory / absolute-weight sets
    pub percentage_of_max: Option<f64>,
    pub rpe: Option<f64>,
    /// Prescribed absolute load for weight-progressed sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
}

/// A performed workout, possibly spanning several days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    #[serde(flatten)]
    pub meta: RecordMeta,
    /// `None` for ad-hoc or combined sessions
    pub workout_day_id: Option<Uuid>,
    /// `None` while in progress
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl WorkoutSession {
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// A logged set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetLog {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub workout_session_id: Uuid,
    /// `None` for ad-hoc sets
    pub workout_set_id: Option<Uuid>,
    pub exercise_id: Uuid,
    pub weight_kg: f64,
    pub reps_completed: u32,
    pub rpe: Option<f64>,
}

/// Which days (and in what order) compose a combined session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionWorkoutDay {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub session_id: Uuid,
    pub workout_day_id: Uuid,
    pub sort_order: u32,
}

/// A reusable workout layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
}

/// One exercise entry of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateItem {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub template_id: Uuid,
    pub exercise_id: Uuid,
    pub sort_order: u32,
    pub reps: u32,
    pub percentage_of_max: Option<f64>,
    pub rpe: Option<f64>,
    pub workout_day_id: Option<Uuid>,
}

impl_record!(Exercise, Exercises, exercises);
impl_record!(MaxLift, MaxLifts, max_lifts);
impl_record!(Program, Programs, programs);
impl_record!(ProgramWeek, ProgramWeeks, program_weeks);
impl_record!(WorkoutDay, WorkoutDays, workout_days);
impl_record!(WorkoutSet, WorkoutSets, workout_sets);
impl_record!(WorkoutSession, WorkoutSessions, workout_sessions);
impl_record!(SetLog, SetLogs, set_logs);
impl_record!(SessionWorkoutDay, SessionWorkoutDays, session_workout_days);
impl_record!(WorkoutTemplate, WorkoutTemplates, workout_templates);
impl_record!(TemplateItem, TemplateItems, template_items);
