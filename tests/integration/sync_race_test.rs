//! Identity changes while a sync round is in flight.

use std::time::Duration;

use liftlog::model::{CollectionName, Exercise, Identity};
use liftlog::sync::SyncSession;

use super::fixtures::Harness;

#[tokio::test]
async fn test_identity_switch_mid_round_discards_stale_work() {
    let h = Harness::new();
    let ctx1 = h.store.identity().set(Identity::User("user-1".to_string()));
    h.store.add_exercise(&ctx1, "Back Squat", None).unwrap();

    let session1 = SyncSession::new(ctx1.clone(), Some("token-1".to_string()));
    h.sync().enable_all(session1).await.unwrap();
    assert_eq!(h.store.pending_len(), 0);

    // A second user-1 write that the slow round below would push.
    let late = h.store.add_exercise(&ctx1, "Bench Press", None).unwrap();

    h.backend.set_latency(Some(Duration::from_millis(50)));
    let round = tokio::spawn({
        let sync = h.sync().clone();
        async move { sync.sync_now().await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Sign out and in as someone else while the pull is waiting.
    h.sync().disable_all();
    h.store.identity().set(Identity::Local);
    let ctx2 = h.store.identity().set(Identity::User("user-2".to_string()));
    h.backend.set_latency(None);

    let stale = round.await.unwrap().unwrap();
    assert!(stale.stale);
    assert_eq!(stale.pushed, 0);

    let report = h
        .sync()
        .enable_all(SyncSession::new(ctx2.clone(), Some("token-2".to_string())))
        .await
        .unwrap();

    // user-1's pending record is neither pushed nor re-tagged.
    assert_eq!(report.skipped, 1);
    assert!(h.store.pending(CollectionName::Exercises).contains(&late));
    assert_eq!(h.store.get::<Exercise>(&late).unwrap().meta.user_id, "user-1");

    for upsert in h.backend.upserts() {
        if upsert.session_user == "user-2" {
            assert_ne!(upsert.id, late.to_string());
        }
    }
    for row in h.backend.rows(CollectionName::Exercises) {
        if row["id"] == late.to_string().as_str() {
            panic!("stale record reached the remote: {}", row);
        }
    }
    assert!(h.backend.rows_for(CollectionName::Exercises, "user-2").is_empty());
}

#[tokio::test]
async fn test_rapid_toggle_never_crosses_identities() {
    let h = Harness::new();
    h.backend.set_latency(Some(Duration::from_millis(5)));

    for round in 0..5 {
        let (email, user) = if round % 2 == 0 {
            ("lifter@example.com", "user-1")
        } else {
            ("other@example.com", "user-2")
        };

        let ctx = h.store.context();
        h.store
            .add_exercise(&ctx, &format!("Anonymous lift {}", round), None)
            .unwrap();

        let sign_in = h.coordinator.sign_in(email, "pw");
        // Give the round a head start, then sign out before it settles.
        let outcome = tokio::time::timeout(Duration::from_millis(15), sign_in).await;
        h.coordinator.sign_out().await.unwrap();

        if let Ok(report) = outcome {
            assert_eq!(report.unwrap().user_id, user);
        }
    }

    h.backend.set_latency(None);
    for upsert in h.backend.upserts() {
        let row = h
            .backend
            .rows(upsert.table)
            .into_iter()
            .find(|r| r["id"] == upsert.id.as_str())
            .unwrap();
        assert_eq!(row["user_id"], upsert.session_user.as_str());
    }
}
