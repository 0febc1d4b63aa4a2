//! Program generation, rollback and cascade delete.

use std::cell::Cell;
use std::collections::BTreeMap;

use liftlog::model::{MaxLift, Program, ProgramWeek, Record, WorkoutDay, WorkoutSet};
use liftlog::programs::{
    create_program_from_maxes, delete_program, generate_program_with, seed_default_exercises,
    CascadeReport, MainLiftMaxes, ProgramSink, StoreSink,
};
use liftlog::store::{ProgramDraft, SetDraft, Store, StoreError};
use uuid::Uuid;

fn maxes() -> MainLiftMaxes {
    MainLiftMaxes {
        squat: 150.0,
        bench: 105.0,
        deadlift: 190.0,
        press: 65.0,
    }
}

/// Delegates to a store sink and fails the Nth set write.
struct FailingSink<'a> {
    inner: StoreSink<'a>,
    fail_at_set: usize,
    sets_written: Cell<usize>,
    cleanup_fails: bool,
}

impl<'a> FailingSink<'a> {
    fn new(inner: StoreSink<'a>, fail_at_set: usize) -> Self {
        Self {
            inner,
            fail_at_set,
            sets_written: Cell::new(0),
            cleanup_fails: false,
        }
    }
}

impl ProgramSink for FailingSink<'_> {
    fn add_program(&self, draft: ProgramDraft) -> Result<Uuid, StoreError> {
        self.inner.add_program(draft)
    }

    fn add_program_week(&self, program_id: Uuid, week_number: u32) -> Result<Uuid, StoreError> {
        self.inner.add_program_week(program_id, week_number)
    }

    fn add_workout_day(&self, week_id: Uuid, day_number: u32, name: &str) -> Result<Uuid, StoreError> {
        self.inner.add_workout_day(week_id, day_number, name)
    }

    fn add_workout_set(&self, draft: SetDraft) -> Result<Uuid, StoreError> {
        let n = self.sets_written.get() + 1;
        self.sets_written.set(n);
        if n == self.fail_at_set {
            return Err(StoreError::WriteFailed(format!("injected failure at set {}", n)));
        }
        self.inner.add_workout_set(draft)
    }

    fn add_max_lift(&self, exercise_id: Uuid, weight_kg: f64) -> Result<Uuid, StoreError> {
        self.inner.add_max_lift(exercise_id, weight_kg)
    }

    fn delete_program(&self, program_id: &Uuid) -> Result<CascadeReport, StoreError> {
        if self.cleanup_fails {
            return Err(StoreError::WriteFailed("cleanup unavailable".to_string()));
        }
        self.inner.delete_program(program_id)
    }
}

#[test]
fn test_default_program_shape() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();

    let program_id = create_program_from_maxes(&store, &ctx, maxes()).unwrap();

    let program: Program = store.get(&program_id).unwrap();
    assert_eq!(program.weeks_count, 4);
    assert_eq!(program.current_week, 1);

    let weeks = store.live::<ProgramWeek>();
    let mut numbers: Vec<u32> = weeks.iter().map(|w| w.week_number).collect();
    numbers.sort();
    assert_eq!(numbers, vec![1, 2, 3, 4]);

    assert_eq!(store.live::<WorkoutDay>().len(), 16);
    assert_eq!(store.live::<WorkoutSet>().len(), 208);
    assert_eq!(store.live::<MaxLift>().len(), 4);

    // Every record is queued for the first push.
    assert_eq!(store.pending_len(), 16 + 1 + 4 + 16 + 208 + 4);
}

#[test]
fn test_failed_generation_leaves_no_live_records() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let exercise_ids = seed_default_exercises(&store, &ctx).unwrap();

    let mut max_lifts = BTreeMap::new();
    max_lifts.insert(exercise_ids["Back Squat"], 150.0);

    let sink = FailingSink::new(StoreSink::new(&store, &ctx), 100);

    let result = generate_program_with(&sink, &max_lifts, &exercise_ids);

    match result {
        Err(StoreError::WriteFailed(msg)) => assert!(msg.contains("set 100")),
        other => panic!("expected the injected failure, got {:?}", other),
    }
    assert!(store.live::<Program>().is_empty());
    assert!(store.live::<ProgramWeek>().is_empty());
    assert!(store.live::<WorkoutDay>().is_empty());
    assert!(store.live::<WorkoutSet>().is_empty());
    assert!(store.live::<MaxLift>().is_empty());

    // The partial records still exist as tombstones so the deletes sync.
    let sets_written = store.view(|c| c.workout_sets.len());
    assert_eq!(sets_written, 99);
}

#[test]
fn test_failed_cleanup_keeps_the_original_error() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let exercise_ids = seed_default_exercises(&store, &ctx).unwrap();

    let mut sink = FailingSink::new(StoreSink::new(&store, &ctx), 10);
    sink.cleanup_fails = true;

    let result = generate_program_with(&sink, &BTreeMap::new(), &exercise_ids);

    match result {
        Err(StoreError::WriteFailed(msg)) => assert!(msg.contains("set 10")),
        other => panic!("expected the injected failure, got {:?}", other),
    }
    // Cleanup never ran, so the partial program is still there.
    assert_eq!(store.live::<Program>().len(), 1);
    assert_eq!(store.live::<WorkoutSet>().len(), 9);
}

#[test]
fn test_cascade_counts_and_is_resumable() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let program_id = create_program_from_maxes(&store, &ctx, maxes()).unwrap();

    // Simulate an interrupted earlier cascade: the program and one day are
    // already gone but their children are not.
    let day = store.live::<WorkoutDay>()[0].id();
    store.soft_delete::<WorkoutDay>(&day).unwrap();
    store.soft_delete::<Program>(&program_id).unwrap();

    let report = delete_program(&store, &program_id).unwrap();

    assert_eq!(report.programs, 0);
    assert_eq!(report.weeks, 4);
    assert_eq!(report.days, 15);
    assert_eq!(report.sets, 208);
    assert!(store.live::<WorkoutSet>().is_empty());

    let again = delete_program(&store, &program_id).unwrap();
    assert_eq!(again.total(), 0);
}

#[test]
fn test_cascade_full_program() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let program_id = create_program_from_maxes(&store, &ctx, maxes()).unwrap();

    let report = delete_program(&store, &program_id).unwrap();

    assert_eq!(report.total(), 1 + 4 + 16 + 208);
    assert!(matches!(
        delete_program(&store, &Uuid::new_v4()),
        Err(StoreError::NotFound { .. })
    ));
}
