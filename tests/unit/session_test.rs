//! Active workout session lifecycle.

use liftlog::model::{SessionWorkoutDay, WorkoutSession};
use liftlog::selectors::{session_days, session_logs, workout_history};
use liftlog::storage::Database;
use liftlog::store::{SetLogDraft, Store};
use tempfile::tempdir;
use uuid::Uuid;

#[test]
fn test_log_set_without_session_is_ignored() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let exercise = store.add_exercise(&ctx, "Row", None).unwrap();

    let logged = store
        .log_set(&ctx, SetLogDraft::new(exercise, 60.0, 10))
        .unwrap();

    assert_eq!(logged, None);
    assert!(store.active_session_logs().is_empty());
}

#[test]
fn test_start_returns_running_session() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let day = Uuid::new_v4();

    let first = store.start_session(&ctx, &[day], &[]).unwrap();
    let second = store.start_session(&ctx, &[Uuid::new_v4()], &[]).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.live::<WorkoutSession>().len(), 1);
    let session: WorkoutSession = store.get(&first).unwrap();
    assert_eq!(session.workout_day_id, Some(day));
}

#[test]
fn test_multi_day_session_links_days_in_order() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let days = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

    let session_id = store.start_session(&ctx, &days, &[]).unwrap();

    let session: WorkoutSession = store.get(&session_id).unwrap();
    assert_eq!(session.workout_day_id, None);

    let links: Vec<SessionWorkoutDay> = store.view(|c| session_days(c, &session_id));
    let linked: Vec<Uuid> = links.iter().map(|l| l.workout_day_id).collect();
    assert_eq!(linked, days.to_vec());
    assert_eq!(links[2].sort_order, 2);
}

#[test]
fn test_active_session_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("session.db");
    let adhoc = Uuid::new_v4();
    let day = Uuid::new_v4();

    let session_id = {
        let store = Store::open(Database::open(&path).unwrap()).unwrap();
        let ctx = store.context();
        let id = store.start_session(&ctx, &[day], &[adhoc]).unwrap();
        store
            .log_set(&ctx, SetLogDraft::new(adhoc, 42.5, 8))
            .unwrap()
            .unwrap();
        id
    };

    let store = Store::open(Database::open(&path).unwrap()).unwrap();
    let active = store.active_session();
    assert_eq!(active.session_id, Some(session_id));
    assert_eq!(active.day_ids, vec![day]);
    assert_eq!(active.adhoc_exercise_ids, vec![adhoc]);
    assert_eq!(store.active_session_logs().len(), 1);

    let ended = store.end_session(Some("last set was a grinder")).unwrap();
    assert_eq!(ended, Some(session_id));
    assert!(!store.active_session().is_active());

    let history = store.view(workout_history);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].notes.as_deref(), Some("last set was a grinder"));
    assert_eq!(store.view(|c| session_logs(c, &session_id)).len(), 1);

    drop(store);
    let reopened = Store::open(Database::open(&path).unwrap()).unwrap();
    assert!(!reopened.active_session().is_active());
}
