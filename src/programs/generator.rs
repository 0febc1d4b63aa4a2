//! Program generation.
//!
//! A generated program is a few hundred dependent writes. They all go through
//! a [`ProgramSink`]; if any write fails the partial program is cascade
//! deleted before the original error is returned.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::cascade::{self, CascadeReport};
use super::catalog::{
    MainLift, ACCESSORY_SCHEME, DAY_LAYOUTS, DEFAULT_EXERCISES, DEFAULT_PROGRAM_NAME,
    WEEKLY_MAIN_LIFT_SCHEME,
};
use crate::model::{is_placeholder_owner, WriteContext};
use crate::store::{ProgramDraft, SetDraft, Store, StoreError};

/// Exercise ids keyed by exercise name.
pub type ExerciseIds = BTreeMap<String, Uuid>;

/// One-rep maxes for the four main lifts, in kg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MainLiftMaxes {
    pub squat: f64,
    pub bench: f64,
    pub deadlift: f64,
    pub press: f64,
}

impl MainLiftMaxes {
    pub fn get(&self, lift: MainLift) -> f64 {
        match lift {
            MainLift::Squat => self.squat,
            MainLift::Bench => self.bench,
            MainLift::Deadlift => self.deadlift,
            MainLift::Press => self.press,
        }
    }
}

/// Write target for program generation.
pub trait ProgramSink {
    fn add_program(&self, draft: ProgramDraft) -> Result<Uuid, StoreError>;

    fn add_program_week(&self, program_id: Uuid, week_number: u32) -> Result<Uuid, StoreError>;

    fn add_workout_day(
        &self,
        program_week_id: Uuid,
        day_number: u32,
        name: &str,
    ) -> Result<Uuid, StoreError>;

    fn add_workout_set(&self, draft: SetDraft) -> Result<Uuid, StoreError>;

    fn add_max_lift(&self, exercise_id: Uuid, weight_kg: f64) -> Result<Uuid, StoreError>;

    /// Undo a partially written program.
    fn delete_program(&self, program_id: &Uuid) -> Result<CascadeReport, StoreError>;
}

/// Writes generated records into a store under one identity.
pub struct StoreSink<'a> {
    store: &'a Store,
    ctx: &'a WriteContext,
}

impl<'a> StoreSink<'a> {
    pub fn new(store: &'a Store, ctx: &'a WriteContext) -> Self {
        Self { store, ctx }
    }
}

impl ProgramSink for StoreSink<'_> {
    fn add_program(&self, draft: ProgramDraft) -> Result<Uuid, StoreError> {
        self.store.add_program(self.ctx, draft)
    }

    fn add_program_week(&self, program_id: Uuid, week_number: u32) -> Result<Uuid, StoreError> {
        self.store.add_program_week(self.ctx, program_id, week_number)
    }

    fn add_workout_day(
        &self,
        program_week_id: Uuid,
        day_number: u32,
        name: &str,
    ) -> Result<Uuid, StoreError> {
        self.store
            .add_workout_day(self.ctx, program_week_id, day_number, Some(name))
    }

    fn add_workout_set(&self, draft: SetDraft) -> Result<Uuid, StoreError> {
        self.store.add_workout_set(self.ctx, draft)
    }

    fn add_max_lift(&self, exercise_id: Uuid, weight_kg: f64) -> Result<Uuid, StoreError> {
        self.store.add_max_lift(self.ctx, exercise_id, weight_kg, None)
    }

    fn delete_program(&self, program_id: &Uuid) -> Result<CascadeReport, StoreError> {
        cascade::delete_program(self.store, program_id)
    }
}

/// Create the program record, then run `build`; on failure cascade delete
/// the program and return the original error.
pub(crate) fn with_rollback<S: ProgramSink>(
    sink: &S,
    draft: ProgramDraft,
    build: impl FnOnce(&S, Uuid) -> Result<(), StoreError>,
) -> Result<Uuid, StoreError> {
    let program_id = sink.add_program(draft)?;

    match build(sink, program_id) {
        Ok(()) => Ok(program_id),
        Err(error) => {
            tracing::warn!("Program {} generation failed, rolling back: {}", program_id, error);
            match sink.delete_program(&program_id) {
                Ok(report) => {
                    tracing::info!("Rolled back {} record(s) of program {}", report.total(), program_id)
                }
                Err(cleanup) => {
                    tracing::error!("Failed to clean up partial program {}: {}", program_id, cleanup)
                }
            }
            Err(error)
        }
    }
}

/// Seed the default exercises, reusing live ones of the same name owned by
/// `ctx`. Returns every catalog name mapped to its id.
pub fn seed_default_exercises(store: &Store, ctx: &WriteContext) -> Result<ExerciseIds, StoreError> {
    let owned = |user_id: &str| {
        user_id == ctx.user_id || (ctx.is_placeholder() && is_placeholder_owner(user_id))
    };

    let mut existing: ExerciseIds = store.view(|c| {
        c.exercises
            .live()
            .filter(|e| owned(&e.meta.user_id))
            .map(|e| (e.name.clone(), e.meta.id))
            .collect()
    });

    let mut ids = ExerciseIds::new();
    let mut created = 0;
    for def in DEFAULT_EXERCISES {
        let id = match existing.remove(def.name) {
            Some(id) => id,
            None => {
                created += 1;
                store.add_exercise(ctx, def.name, Some(def.category))?
            }
        };
        ids.insert(def.name.to_string(), id);
    }

    tracing::debug!("Seeded {} default exercise(s)", created);
    Ok(ids)
}

/// Generate the default 4-week, 4-day program with its max lift records.
pub fn generate_program(
    store: &Store,
    ctx: &WriteContext,
    max_lifts: &BTreeMap<Uuid, f64>,
    exercise_ids: &ExerciseIds,
) -> Result<Uuid, StoreError> {
    let _batch = store.batch();
    generate_program_with(&StoreSink::new(store, ctx), max_lifts, exercise_ids)
}

/// [`generate_program`] against any sink.
pub fn generate_program_with<S: ProgramSink>(
    sink: &S,
    max_lifts: &BTreeMap<Uuid, f64>,
    exercise_ids: &ExerciseIds,
) -> Result<Uuid, StoreError> {
    let lookup = |name: &str| {
        exercise_ids
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::Validation(format!("exercise '{}' has no id", name)))
    };

    // Resolve everything up front so a bad input writes nothing.
    let mut days = Vec::with_capacity(DAY_LAYOUTS.len());
    for layout in DAY_LAYOUTS {
        let main = lookup(layout.main_lift.exercise_name())?;
        let accessories = layout
            .accessories
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<Vec<_>, _>>()?;
        days.push((layout.name, main, accessories));
    }
    for (exercise_id, weight) in max_lifts {
        if !(weight.is_finite() && *weight > 0.0) {
            return Err(StoreError::Validation(format!(
                "max for {} must be positive, got {}",
                exercise_id, weight
            )));
        }
    }

    let draft = ProgramDraft::new(DEFAULT_PROGRAM_NAME)
        .weeks(WEEKLY_MAIN_LIFT_SCHEME.len() as u32)
        .program_type("strength");

    let program_id = with_rollback(sink, draft, |sink, program_id| {
        for (week_index, scheme) in WEEKLY_MAIN_LIFT_SCHEME.iter().enumerate() {
            let week_id = sink.add_program_week(program_id, week_index as u32 + 1)?;

            for (day_index, (name, main, accessories)) in days.iter().enumerate() {
                let day_id = sink.add_workout_day(week_id, day_index as u32 + 1, name)?;
                let mut set_number = 1;

                for _ in 0..scheme.sets {
                    sink.add_workout_set(SetDraft {
                        workout_day_id: day_id,
                        exercise_id: *main,
                        set_number,
                        reps: scheme.reps,
                        percentage_of_max: scheme.percentage,
                        rpe: None,
                        weight_kg: None,
                    })?;
                    set_number += 1;
                }

                for accessory in accessories {
                    for _ in 0..ACCESSORY_SCHEME.sets {
                        sink.add_workout_set(SetDraft {
                            workout_day_id: day_id,
                            exercise_id: *accessory,
                            set_number,
                            reps: ACCESSORY_SCHEME.reps,
                            percentage_of_max: None,
                            rpe: None,
                            weight_kg: None,
                        })?;
                        set_number += 1;
                    }
                }
            }
        }

        for (exercise_id, weight) in max_lifts {
            sink.add_max_lift(*exercise_id, *weight)?;
        }

        Ok(())
    })?;

    tracing::info!("Generated program {}", program_id);
    Ok(program_id)
}

/// Seed exercises and generate the default program from four maxes.
pub fn create_program_from_maxes(
    store: &Store,
    ctx: &WriteContext,
    maxes: MainLiftMaxes,
) -> Result<Uuid, StoreError> {
    for lift in MainLift::ALL {
        let weight = maxes.get(lift);
        if !(weight.is_finite() && weight > 0.0) {
            return Err(StoreError::Validation(format!(
                "{} max must be positive, got {}",
                lift.category(),
                weight
            )));
        }
    }

    let exercise_ids = seed_default_exercises(store, ctx)?;

    let mut max_lifts = BTreeMap::new();
    for lift in MainLift::ALL {
        let id = exercise_ids
            .get(lift.exercise_name())
            .copied()
            .ok_or_else(|| StoreError::Validation(format!("{} not seeded", lift.exercise_name())))?;
        max_lifts.insert(id, maxes.get(lift));
    }

    generate_program(store, ctx, &max_lifts, &exercise_ids)
}
