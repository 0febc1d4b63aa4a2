//! Migration of anonymous data, persisted across restarts.

use liftlog::migration::migrate_local_data;
use liftlog::model::{is_placeholder_owner, CollectionName, Identity, SetLog, WorkoutSession};
use liftlog::storage::Database;
use liftlog::store::{SetLogDraft, Store};
use tempfile::tempdir;

#[test]
fn test_migration_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("liftlog.db");

    let (session_id, log_id) = {
        let store = Store::open(Database::open(&path).unwrap()).unwrap();
        let ctx = store.context();
        let bench = store.add_exercise(&ctx, "Bench Press", Some("bench")).unwrap();
        let session_id = store.start_session(&ctx, &[], &[bench]).unwrap();
        let log_id = store
            .log_set(&ctx, SetLogDraft::new(bench, 100.0, 5).rpe(8.0))
            .unwrap()
            .unwrap();

        let target = store.identity().set(Identity::User("user-9".to_string()));
        let report = migrate_local_data(&store, &target).unwrap();
        assert_eq!(report.reassigned, 3);
        store.flush().unwrap();
        (session_id, log_id)
    };

    let store = Store::open(Database::open(&path).unwrap()).unwrap();

    let log: SetLog = store.get(&log_id).unwrap();
    assert_eq!(log.meta.user_id, "user-9");
    assert_eq!(log.rpe, Some(8.0));
    let session: WorkoutSession = store.get(&session_id).unwrap();
    assert_eq!(session.meta.user_id, "user-9");

    // The active session and the outbox come back with the data.
    assert_eq!(store.active_session().session_id, Some(session_id));
    assert_eq!(store.pending(CollectionName::SetLogs), vec![log_id]);
    assert_eq!(store.pending_len(), 3);

    let none_left = store.view(|c| {
        c.set_logs
            .including_deleted()
            .all(|l| !is_placeholder_owner(&l.meta.user_id))
            && c.exercises
                .including_deleted()
                .all(|e| !is_placeholder_owner(&e.meta.user_id))
    });
    assert!(none_left);
}

#[test]
fn test_second_migration_is_a_no_op() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    store.add_exercise(&ctx, "Lunge", None).unwrap();

    let target = store.identity().set(Identity::User("user-3".to_string()));
    assert_eq!(migrate_local_data(&store, &target).unwrap().reassigned, 1);

    let again = migrate_local_data(&store, &target).unwrap();
    assert_eq!(again.reassigned, 0);
    assert!(again.is_complete());
}
