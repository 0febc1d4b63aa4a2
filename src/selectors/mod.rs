//! Read-side views over the store.
//!
//! Selectors are plain functions of [`Collections`], so they run inside
//! [`Store::view`](crate::store::Store::view) or as the projection of a
//! [`DerivedView`](crate::store::DerivedView). Tombstoned records never
//! appear in their output.

pub mod history;
pub mod programs;

use uuid::Uuid;

use crate::model::{CollectionName, Program, Record};
use crate::store::{Store, StoreError};

pub use history::{session_days, session_logs, template_items, workout_history, workout_templates};
pub use programs::{
    active_program, all_current_workout_days, all_programs, completed_day_ids, completed_weeks,
    current_max_lifts, exercises, multi_day_exercises, week_completion, week_workouts,
    workout_day_exercises, workout_day_sets, CurrentWorkoutDay, ExerciseGroup, WeekCompletion,
    WorkoutSetView, UNKNOWN_EXERCISE,
};

/// Collections that affect week completion.
pub const COMPLETION_INPUTS: [CollectionName; 5] = [
    CollectionName::Programs,
    CollectionName::ProgramWeeks,
    CollectionName::WorkoutDays,
    CollectionName::WorkoutSessions,
    CollectionName::SessionWorkoutDays,
];

/// Move a program to its next week once every day of the current week is
/// complete. Returns the new week, or `None` when nothing changed.
pub fn advance_week_if_complete(store: &Store, program_id: &Uuid) -> Result<Option<u32>, StoreError> {
    let program = store
        .get_live::<Program>(program_id)
        .ok_or(StoreError::NotFound {
            collection: Program::COLLECTION,
            id: *program_id,
        })?;

    let week = program.current_week.max(1);
    if week >= program.weeks_count {
        return Ok(None);
    }

    let completion = store.view(|c| week_completion(c, program_id, week));
    if !completion.all_complete {
        return Ok(None);
    }

    let next = store.set_current_week(program_id, week + 1)?;
    tracing::info!("Program {} advanced to week {}", program_id, next);
    Ok(Some(next))
}
