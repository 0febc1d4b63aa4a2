//! Data model: entity records and the identity they are written under.

pub mod identity;
pub mod types;

pub use identity::{is_placeholder_owner, Identity, IdentityRegister, WriteContext, LOCAL_USER_ID};
pub use types::{
    CollectionName, Exercise, MaxLift, Program, ProgramWeek, Record, RecordMeta, SessionWorkoutDay,
    SetLog, TemplateItem, WorkoutDay, WorkoutSession, WorkoutSet, WorkoutTemplate,
};
