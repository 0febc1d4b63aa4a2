//! CRUD helpers used by the presentation layer.
//!
//! Every helper validates its input before touching the store, so a rejected
//! call never leaves partial state behind. Helpers propagate every store
//! error; callers decide about rollback.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::model::{
    Exercise, MaxLift, Program, ProgramWeek, Record, RecordMeta, SessionWorkoutDay, SetLog,
    TemplateItem, WorkoutDay, WorkoutSession, WorkoutSet, WorkoutTemplate, WriteContext,
};
use crate::store::{Store, StoreError};

/// Weeks used when a program is created without an explicit length.
pub const DEFAULT_WEEKS_COUNT: u32 = 4;

/// Input for [`Store::add_program`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramDraft {
    pub name: String,
    pub description: Option<String>,
    pub weeks_count: u32,
    pub program_type: Option<String>,
    pub wizard_config: Option<Value>,
}

impl ProgramDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            weeks_count: DEFAULT_WEEKS_COUNT,
            program_type: None,
            wizard_config: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn weeks(mut self, weeks_count: u32) -> Self {
        self.weeks_count = weeks_count;
        self
    }

    pub fn program_type(mut self, program_type: impl Into<String>) -> Self {
        self.program_type = Some(program_type.into());
        self
    }

    pub fn wizard_config(mut self, config: Value) -> Self {
        self.wizard_config = Some(config);
        self
    }
}

/// Input for [`Store::add_workout_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct SetDraft {
    pub workout_day_id: Uuid,
    pub exercise_id: Uuid,
    pub set_number: u32,
    pub reps: u32,
    pub percentage_of_max: Option<f64>,
    pub rpe: Option<f64>,
    pub weight_kg: Option<f64>,
}

/// Input for [`Store::add_set_log`] and [`Store::log_set`].
#[derive(Debug, Clone, PartialEq)]
pub struct SetLogDraft {
    pub exercise_id: Uuid,
    pub weight_kg: f64,
    pub reps_completed: u32,
    pub workout_set_id: Option<Uuid>,
    pub rpe: Option<f64>,
}

impl SetLogDraft {
    pub fn new(exercise_id: Uuid, weight_kg: f64, reps_completed: u32) -> Self {
        Self {
            exercise_id,
            weight_kg,
            reps_completed,
            workout_set_id: None,
            rpe: None,
        }
    }

    pub fn for_set(mut self, workout_set_id: Uuid) -> Self {
        self.workout_set_id = Some(workout_set_id);
        self
    }

    pub fn rpe(mut self, rpe: f64) -> Self {
        self.rpe = Some(rpe);
        self
    }
}

/// Input for [`Store::add_template_item`].
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateItemDraft {
    pub template_id: Uuid,
    pub exercise_id: Uuid,
    pub sort_order: u32,
    pub reps: u32,
    pub percentage_of_max: Option<f64>,
    pub rpe: Option<f64>,
    pub workout_day_id: Option<Uuid>,
}

fn invalid(msg: impl Into<String>) -> StoreError {
    StoreError::Validation(msg.into())
}

fn require_name(name: &str, what: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(invalid(format!("{} name must not be empty", what)));
    }
    Ok(())
}

fn validate_percentage(percentage: Option<f64>) -> Result<(), StoreError> {
    match percentage {
        Some(p) if !(p.is_finite() && p > 0.0 && p <= 1.0) => {
            Err(invalid(format!("percentage of max must be in (0, 1], got {}", p)))
        }
        _ => Ok(()),
    }
}

fn validate_rpe(rpe: Option<f64>) -> Result<(), StoreError> {
    match rpe {
        Some(r) if !(r.is_finite() && (1.0..=10.0).contains(&r)) => {
            Err(invalid(format!("RPE must be within 1..=10, got {}", r)))
        }
        _ => Ok(()),
    }
}

impl Store {
    pub fn add_exercise(
        &self,
        ctx: &WriteContext,
        name: &str,
        category: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        require_name(name, "exercise")?;

        self.insert(
            ctx,
            Exercise {
                meta: RecordMeta::new(),
                name: name.to_string(),
                category: category.map(str::to_string),
            },
        )
    }

    /// Record a one-rep max. `date_recorded` defaults to now.
    pub fn add_max_lift(
        &self,
        ctx: &WriteContext,
        exercise_id: Uuid,
        weight_kg: f64,
        date_recorded: Option<DateTime<Utc>>,
    ) -> Result<Uuid, StoreError> {
        if !(weight_kg.is_finite() && weight_kg > 0.0) {
            return Err(invalid(format!("max lift weight must be positive, got {}", weight_kg)));
        }

        self.insert(
            ctx,
            MaxLift {
                meta: RecordMeta::new(),
                exercise_id,
                weight_kg,
                date_recorded: Some(date_recorded.unwrap_or_else(Utc::now)),
            },
        )
    }

    /// Create a program starting today at week 1.
    pub fn add_program(&self, ctx: &WriteContext, draft: ProgramDraft) -> Result<Uuid, StoreError> {
        require_name(&draft.name, "program")?;
        if draft.weeks_count == 0 {
            return Err(invalid("program must have at least one week"));
        }

        self.insert(
            ctx,
            Program {
                meta: RecordMeta::new(),
                name: draft.name,
                description: draft.description,
                weeks_count: draft.weeks_count,
                current_week: 1,
                start_date: Some(Utc::now()),
                program_type: draft.program_type,
                wizard_config: draft.wizard_config,
            },
        )
    }

    pub fn add_program_week(
        &self,
        ctx: &WriteContext,
        program_id: Uuid,
        week_number: u32,
    ) -> Result<Uuid, StoreError> {
        if week_number == 0 {
            return Err(invalid("week number is 1-based"));
        }

        self.insert(
            ctx,
            ProgramWeek {
                meta: RecordMeta::new(),
                program_id,
                week_number,
            },
        )
    }

    pub fn add_workout_day(
        &self,
        ctx: &WriteContext,
        program_week_id: Uuid,
        day_number: u32,
        name: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        if day_number == 0 {
            return Err(invalid("day number is 1-based"));
        }

        self.insert(
            ctx,
            WorkoutDay {
                meta: RecordMeta::new(),
                program_week_id,
                day_number,
                name: name.map(str::to_string),
            },
        )
    }

    pub fn add_workout_set(&self, ctx: &WriteContext, draft: SetDraft) -> Result<Uuid, StoreError> {
        if draft.reps == 0 {
            return Err(invalid("a prescribed set needs at least one rep"));
        }
        validate_percentage(draft.percentage_of_max)?;
        validate_rpe(draft.rpe)?;
        if let Some(w) = draft.weight_kg {
            if !(w.is_finite() && w >= 0.0) {
                return Err(invalid(format!("prescribed weight must not be negative, got {}", w)));
            }
        }

        self.insert(
            ctx,
            WorkoutSet {
                meta: RecordMeta::new(),
                workout_day_id: draft.workout_day_id,
                exercise_id: draft.exercise_id,
                set_number: draft.set_number,
                reps: draft.reps,
                percentage_of_max: draft.percentage_of_max,
                rpe: draft.rpe,
                weight_kg: draft.weight_kg,
            },
        )
    }

    /// Create an in-progress session.
    pub fn add_workout_session(
        &self,
        ctx: &WriteContext,
        workout_day_id: Option<Uuid>,
    ) -> Result<Uuid, StoreError> {
        self.insert(
            ctx,
            WorkoutSession {
                meta: RecordMeta::new(),
                workout_day_id,
                completed_at: None,
                notes: None,
            },
        )
    }

    /// Mark a session complete now.
    pub fn complete_session(&self, session_id: &Uuid, notes: Option<&str>) -> Result<(), StoreError> {
        self.set_field::<WorkoutSession>(session_id, "completed_at", Utc::now())?;
        if let Some(notes) = notes {
            self.set_field::<WorkoutSession>(session_id, "notes", notes)?;
        }
        Ok(())
    }

    pub fn add_set_log(
        &self,
        ctx: &WriteContext,
        session_id: Uuid,
        draft: SetLogDraft,
    ) -> Result<Uuid, StoreError> {
        if !(draft.weight_kg.is_finite() && draft.weight_kg >= 0.0) {
            return Err(invalid(format!(
                "logged weight must not be negative, got {}",
                draft.weight_kg
            )));
        }
        validate_rpe(draft.rpe)?;

        self.insert(
            ctx,
            SetLog {
                meta: RecordMeta::new(),
                workout_session_id: session_id,
                workout_set_id: draft.workout_set_id,
                exercise_id: draft.exercise_id,
                weight_kg: draft.weight_kg,
                reps_completed: draft.reps_completed,
                rpe: draft.rpe,
            },
        )
    }

    pub fn add_session_workout_day(
        &self,
        ctx: &WriteContext,
        session_id: Uuid,
        workout_day_id: Uuid,
        sort_order: u32,
    ) -> Result<Uuid, StoreError> {
        self.insert(
            ctx,
            SessionWorkoutDay {
                meta: RecordMeta::new(),
                session_id,
                workout_day_id,
                sort_order,
            },
        )
    }

    pub fn add_workout_template(&self, ctx: &WriteContext, name: &str) -> Result<Uuid, StoreError> {
        require_name(name, "template")?;

        self.insert(
            ctx,
            WorkoutTemplate {
                meta: RecordMeta::new(),
                name: name.to_string(),
            },
        )
    }

    pub fn add_template_item(
        &self,
        ctx: &WriteContext,
        draft: TemplateItemDraft,
    ) -> Result<Uuid, StoreError> {
        if draft.reps == 0 {
            return Err(invalid("a template item needs at least one rep"));
        }
        validate_percentage(draft.percentage_of_max)?;
        validate_rpe(draft.rpe)?;

        self.insert(
            ctx,
            TemplateItem {
                meta: RecordMeta::new(),
                template_id: draft.template_id,
                exercise_id: draft.exercise_id,
                sort_order: draft.sort_order,
                reps: draft.reps,
                percentage_of_max: draft.percentage_of_max,
                rpe: draft.rpe,
                workout_day_id: draft.workout_day_id,
            },
        )
    }

    /// Move a program to `week`, clamped to `1..=weeks_count`. Returns the stored week.
    pub fn set_current_week(&self, program_id: &Uuid, week: u32) -> Result<u32, StoreError> {
        let program = self
            .get_live::<Program>(program_id)
            .ok_or(StoreError::NotFound {
                collection: Program::COLLECTION,
                id: *program_id,
            })?;

        let clamped = week.clamp(1, program.weeks_count.max(1));
        if clamped != program.current_week {
            self.set_field::<Program>(program_id, "current_week", clamped)?;
        }
        Ok(clamped)
    }
}
