//! Custom programs built from a wizard configuration.
//!
//! The configuration is stored verbatim on the program (`wizard_config`), so
//! it keeps the camelCase field names the client sends.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::generator::{with_rollback, ProgramSink, StoreSink};
use crate::model::WriteContext;
use crate::store::{ProgramDraft, SetDraft, Store, StoreError};

/// `program_type` of wizard-built programs.
pub const CUSTOM_PROGRAM_TYPE: &str = "custom";

pub const MAX_WEEKS: u32 = 52;
pub const MAX_SESSIONS: usize = 7;
pub const MAX_SETS: u32 = 20;
pub const MAX_REPS: u32 = 100;

/// How a prescription changes from one week to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressionRule {
    #[default]
    Fixed,
    /// Adds `amount` (a fraction of the max) to the percentage each week
    IncrementPercentage {
        #[serde(default = "default_percentage_step")]
        amount: f64,
    },
    IncrementReps {
        #[serde(default = "default_rep_step")]
        amount: u32,
    },
    /// Adds `amount` kg to the absolute weight each week
    IncrementWeight {
        #[serde(default = "default_weight_step")]
        amount: f64,
    },
}

fn default_percentage_step() -> f64 {
    0.025
}

fn default_rep_step() -> u32 {
    1
}

fn default_weight_step() -> f64 {
    2.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardExercise {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub sets: u32,
    pub reps: u32,
    /// Fraction of the one-rep max
    pub percentage: Option<f64>,
    /// Absolute load in kg, used when `percentage` is absent
    pub weight: Option<f64>,
    #[serde(default)]
    pub progression: ProgressionRule,
}

/// Prescription for one week.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeekPrescription {
    pub reps: u32,
    pub percentage: Option<f64>,
    pub weight_kg: Option<f64>,
}

impl WizardExercise {
    /// Prescription in week `week_index` (0-based).
    pub fn prescription(&self, week_index: u32) -> Result<WeekPrescription, StoreError> {
        let step = week_index as f64;
        let mut reps = self.reps;
        let mut percentage = self.percentage;
        let mut weight_kg = if self.percentage.is_none() {
            self.weight
        } else {
            None
        };

        match self.progression {
            ProgressionRule::Fixed => {}
            ProgressionRule::IncrementPercentage { amount } => {
                percentage = percentage.map(|p| p + amount * step);
            }
            ProgressionRule::IncrementReps { amount } => {
                reps = amount
                    .checked_mul(week_index)
                    .and_then(|extra| reps.checked_add(extra))
                    .filter(|r| *r <= MAX_REPS)
                    .ok_or_else(|| {
                        StoreError::Validation(format!(
                            "{} exceeds {} reps in week {}",
                            self.exercise_name,
                            MAX_REPS,
                            week_index + 1
                        ))
                    })?;
            }
            ProgressionRule::IncrementWeight { amount } => {
                weight_kg = weight_kg.map(|w| w + amount * step);
            }
        }

        Ok(WeekPrescription {
            reps,
            percentage,
            weight_kg,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSession {
    pub name: String,
    pub exercises: Vec<WizardExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardConfig {
    pub program_name: String,
    pub weeks_count: u32,
    pub sessions: Vec<WizardSession>,
}

impl WizardConfig {
    /// Check the whole configuration, every week included.
    pub fn validate(&self) -> Result<(), StoreError> {
        let invalid = |msg: String| Err(StoreError::Validation(msg));

        if self.program_name.trim().is_empty() {
            return invalid("program name is required".to_string());
        }
        if !(1..=MAX_WEEKS).contains(&self.weeks_count) {
            return invalid(format!("weeks must be between 1 and {}", MAX_WEEKS));
        }
        if self.sessions.is_empty() || self.sessions.len() > MAX_SESSIONS {
            return invalid(format!("sessions must be between 1 and {}", MAX_SESSIONS));
        }

        for session in &self.sessions {
            if session.exercises.is_empty() {
                return invalid(format!("\"{}\" has no exercises", session.name));
            }
            for exercise in &session.exercises {
                if exercise.sets == 0 || exercise.reps == 0 {
                    return invalid(format!("{} needs sets and reps", exercise.exercise_name));
                }
                if exercise.sets > MAX_SETS || exercise.reps > MAX_REPS {
                    return invalid(format!(
                        "{} is limited to {} sets of {} reps",
                        exercise.exercise_name, MAX_SETS, MAX_REPS
                    ));
                }
                for week in 0..self.weeks_count {
                    let p = exercise.prescription(week)?;
                    if let Some(pct) = p.percentage {
                        if !(pct.is_finite() && pct > 0.0 && pct <= 1.0) {
                            return invalid(format!(
                                "{} reaches {:.1}% of max in week {}",
                                exercise.exercise_name,
                                pct * 100.0,
                                week + 1
                            ));
                        }
                    }
                    if let Some(w) = p.weight_kg {
                        if !(w.is_finite() && w >= 0.0) {
                            return invalid(format!(
                                "{} has an invalid weight in week {}",
                                exercise.exercise_name,
                                week + 1
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

/// Build a custom program: one week per `weeks_count`, one day per session.
pub fn generate_program_from_wizard(
    store: &Store,
    ctx: &WriteContext,
    config: &WizardConfig,
) -> Result<Uuid, StoreError> {
    let _batch = store.batch();
    generate_program_from_wizard_with(&StoreSink::new(store, ctx), config)
}

/// [`generate_program_from_wizard`] against any sink.
pub fn generate_program_from_wizard_with<S: ProgramSink>(
    sink: &S,
    config: &WizardConfig,
) -> Result<Uuid, StoreError> {
    config.validate()?;

    let draft = ProgramDraft::new(config.program_name.trim())
        .weeks(config.weeks_count)
        .program_type(CUSTOM_PROGRAM_TYPE)
        .wizard_config(serde_json::to_value(config)?);

    let program_id = with_rollback(sink, draft, |sink, program_id| {
        for week_index in 0..config.weeks_count {
            let week_id = sink.add_program_week(program_id, week_index + 1)?;

            for (day_index, session) in config.sessions.iter().enumerate() {
                let day_id = sink.add_workout_day(week_id, day_index as u32 + 1, &session.name)?;
                let mut set_number = 1;

                for exercise in &session.exercises {
                    let p = exercise.prescription(week_index)?;
                    for _ in 0..exercise.sets {
                        sink.add_workout_set(SetDraft {
                            workout_day_id: day_id,
                            exercise_id: exercise.exercise_id,
                            set_number,
                            reps: p.reps,
                            percentage_of_max: p.percentage,
                            rpe: None,
                            weight_kg: p.weight_kg,
                        })?;
                        set_number += 1;
                    }
                }
            }
        }
        Ok(())
    })?;

    tracing::info!(
        "Generated custom program {} ({} week(s), {} session(s))",
        program_id,
        config.weeks_count,
        config.sessions.len()
    );
    Ok(program_id)
}
