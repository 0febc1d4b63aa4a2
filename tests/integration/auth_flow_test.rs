//! Sign-up, restore and sign-out through the auth coordinator.

use std::time::Duration;

use liftlog::auth::{AuthError, AuthProvider, SessionRestore};
use liftlog::model::{CollectionName, Exercise, Program};
use liftlog::programs::{create_program_from_maxes, MainLiftMaxes};
use liftlog::sync::SyncStatus;

use super::fixtures::Harness;

#[tokio::test]
async fn test_sign_up_migrates_generated_program() {
    let h = Harness::new();
    let ctx = h.store.context();
    let maxes = MainLiftMaxes {
        squat: 120.0,
        bench: 80.0,
        deadlift: 150.0,
        press: 50.0,
    };
    create_program_from_maxes(&h.store, &ctx, maxes).unwrap();
    let local_records = h.store.pending_len();

    let report = h
        .coordinator
        .sign_up("new@example.com", "pw")
        .await
        .unwrap()
        .unwrap();

    let migration = report.migration.unwrap();
    assert_eq!(migration.reassigned, local_records);
    assert!(migration.is_complete());
    assert_eq!(report.initial_sync.unwrap().pushed, local_records);

    for program in h.store.live::<Program>() {
        assert_eq!(program.meta.user_id, report.user_id);
    }
    assert_eq!(
        h.backend.rows_for(CollectionName::WorkoutSets, &report.user_id).len(),
        208
    );
    assert_eq!(h.sync().status(CollectionName::Programs), SyncStatus::Enabled);
}

#[tokio::test]
async fn test_restore_signed_in_session() {
    let h = Harness::new();
    h.auth.sign_in("lifter@example.com", "pw").await.unwrap();

    match h.coordinator.restore().await {
        SessionRestore::SignedIn(report) => assert_eq!(report.user_id, "user-1"),
        other => panic!("expected a restored session, got {:?}", other),
    }
    assert!(h.sync().is_enabled());
}

#[tokio::test]
async fn test_offline_restore_keeps_working_locally() {
    let h = Harness::new();
    h.auth
        .fail_restore(Some(AuthError::NetworkError("no route".to_string())));

    assert!(matches!(
        h.coordinator.restore().await,
        SessionRestore::Offline(AuthError::NetworkError(_))
    ));

    let ctx = h.store.context();
    assert!(ctx.is_placeholder());
    h.store.add_exercise(&ctx, "Hip Thrust", None).unwrap();
    assert_eq!(h.store.live::<Exercise>().len(), 1);
    assert!(!h.sync().is_enabled());
}

#[tokio::test]
async fn test_sign_out_stops_sync_and_keeps_data() {
    let h = Harness::new();
    h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();
    let ctx = h.store.context();
    h.store.add_exercise(&ctx, "Dip", None).unwrap();

    h.coordinator.sign_out().await.unwrap();

    assert!(!h.sync().is_enabled());
    assert!(h.store.context().is_placeholder());
    // Signed-out data stays on the device under its owner.
    let dip = h
        .store
        .live::<Exercise>()
        .into_iter()
        .find(|e| e.name == "Dip")
        .unwrap();
    assert_eq!(dip.meta.user_id, "user-1");

    // New writes after sign-out are not pushed.
    let before = h.backend.request_count();
    h.store
        .add_exercise(&h.store.context(), "Chin-up", None)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.backend.request_count(), before);
}

#[tokio::test]
async fn test_listener_follows_provider_sign_out() {
    let h = std::sync::Arc::new(Harness::new());
    h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();

    let coordinator = std::sync::Arc::new(liftlog::auth::AuthCoordinator::new(
        std::sync::Arc::clone(&h.auth),
        h.store.clone(),
        h.sync().clone(),
    ));
    let listener = coordinator.listen();

    // Session revoked on the provider side.
    h.auth.set_session(None);

    for _ in 0..20 {
        if !h.sync().is_enabled() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(!h.sync().is_enabled());
    assert!(h.store.context().is_placeholder());
    listener.abort();
}
