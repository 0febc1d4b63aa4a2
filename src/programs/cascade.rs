//! Cascading soft delete of a program graph.

use std::collections::HashSet;

use uuid::Uuid;

use crate::model::{Program, ProgramWeek, Record, WorkoutDay, WorkoutSet};
use crate::store::{Store, StoreError};

/// Records newly tombstoned by a cascade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub programs: usize,
    pub weeks: usize,
    pub days: usize,
    pub sets: usize,
}

impl CascadeReport {
    pub fn total(&self) -> usize {
        self.programs + self.weeks + self.days + self.sets
    }
}

/// Tombstone a program with its weeks, days and sets, parents first.
///
/// Children of an already-deleted parent are still visited, so a cascade
/// interrupted halfway is finished by calling it again. Records that are
/// already tombstoned are skipped and not counted.
pub fn delete_program(store: &Store, program_id: &Uuid) -> Result<CascadeReport, StoreError> {
    if store.get::<Program>(program_id).is_none() {
        return Err(StoreError::NotFound {
            collection: Program::COLLECTION,
            id: *program_id,
        });
    }

    let _batch = store.batch();
    let mut report = CascadeReport::default();
    if store.soft_delete::<Program>(program_id)? {
        report.programs += 1;
    }

    let week_ids: Vec<Uuid> = store.view(|c| {
        c.program_weeks
            .including_deleted()
            .filter(|w| w.program_id == *program_id)
            .map(|w| w.id())
            .collect()
    });
    report.weeks = tombstone_all::<ProgramWeek>(store, &week_ids)?;

    let week_set: HashSet<Uuid> = week_ids.into_iter().collect();
    let day_ids: Vec<Uuid> = store.view(|c| {
        c.workout_days
            .including_deleted()
            .filter(|d| week_set.contains(&d.program_week_id))
            .map(|d| d.id())
            .collect()
    });
    report.days = tombstone_all::<WorkoutDay>(store, &day_ids)?;

    let day_set: HashSet<Uuid> = day_ids.into_iter().collect();
    let set_ids: Vec<Uuid> = store.view(|c| {
        c.workout_sets
            .including_deleted()
            .filter(|s| day_set.contains(&s.workout_day_id))
            .map(|s| s.id())
            .collect()
    });
    report.sets = tombstone_all::<WorkoutSet>(store, &set_ids)?;

    tracing::info!(
        "Deleted program {}: {} week(s), {} day(s), {} set(s)",
        program_id,
        report.weeks,
        report.days,
        report.sets
    );

    Ok(report)
}

fn tombstone_all<T: Record>(store: &Store, ids: &[Uuid]) -> Result<usize, StoreError> {
    let mut count = 0;
    for id in ids {
        if store.soft_delete::<T>(id)? {
            count += 1;
        }
    }
    Ok(count)
}
