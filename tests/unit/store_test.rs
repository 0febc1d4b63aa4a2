//! Durable collection store.

use liftlog::model::{CollectionName, Exercise, MaxLift, Program};
use liftlog::storage::Database;
use liftlog::store::{ProgramDraft, Store, StoreError};
use serde_json::json;
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn test_records_and_outbox_reload_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.db");

    let (program_id, lift_id) = {
        let store = Store::open(Database::open(&path).unwrap()).unwrap();
        let ctx = store.context();
        let squat = store.add_exercise(&ctx, "Back Squat", Some("squat")).unwrap();
        let lift_id = store.add_max_lift(&ctx, squat, 160.0, None).unwrap();
        let program_id = store
            .add_program(&ctx, ProgramDraft::new("Block 1").weeks(6).description("volume"))
            .unwrap();
        store.set_current_week(&program_id, 9).unwrap();
        (program_id, lift_id)
    };

    let store = Store::open(Database::open(&path).unwrap()).unwrap();

    let program: Program = store.get(&program_id).unwrap();
    assert_eq!(program.weeks_count, 6);
    assert_eq!(program.current_week, 6);
    assert_eq!(program.description.as_deref(), Some("volume"));
    assert_eq!(store.get::<MaxLift>(&lift_id).unwrap().weight_kg, 160.0);
    assert_eq!(store.pending_len(), 3);
}

#[test]
fn test_validation_rejects_bad_input_before_writing() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let exercise = store.add_exercise(&ctx, "Deadlift", None).unwrap();

    assert!(matches!(
        store.add_exercise(&ctx, "   ", None),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        store.add_max_lift(&ctx, exercise, -5.0, None),
        Err(StoreError::Validation(_))
    ));
    assert!(matches!(
        store.add_program(&ctx, ProgramDraft::new("Zero").weeks(0)),
        Err(StoreError::Validation(_))
    ));
    assert_eq!(store.pending_len(), 1);
}

#[test]
fn test_assign_merges_and_keeps_identity_fields() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let id = Uuid::new_v4();

    store
        .assign::<Exercise>(&ctx, id, json!({"name": "Hack Squat", "category": null}))
        .unwrap();
    let created: Exercise = store.get(&id).unwrap();

    store
        .assign::<Exercise>(&ctx, id, json!({"category": "squat"}))
        .unwrap();
    let merged: Exercise = store.get(&id).unwrap();

    assert_eq!(merged.name, "Hack Squat");
    assert_eq!(merged.category.as_deref(), Some("squat"));
    assert_eq!(merged.meta.created_at, created.meta.created_at);
    assert!(merged.meta.updated_at >= created.meta.updated_at);
}

#[test]
fn test_soft_deleted_records_stay_addressable() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let id = store.add_exercise(&ctx, "Leg Press", None).unwrap();

    assert!(store.soft_delete::<Exercise>(&id).unwrap());
    assert!(!store.soft_delete::<Exercise>(&id).unwrap());

    assert!(store.get_live::<Exercise>(&id).is_none());
    assert!(store.get::<Exercise>(&id).unwrap().meta.deleted);
    assert_eq!(store.pending(CollectionName::Exercises), vec![id]);

    let counts = store.counts();
    let exercises = counts
        .iter()
        .find(|c| c.collection == CollectionName::Exercises)
        .unwrap();
    assert_eq!((exercises.live, exercises.total), (0, 1));
}
