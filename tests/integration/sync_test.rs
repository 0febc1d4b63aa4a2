//! Pull/push rounds against the in-memory backend.

use chrono::{Duration, Utc};
use liftlog::model::{CollectionName, Exercise, Identity, SetLog};
use liftlog::store::SetLogDraft;
use liftlog::sync::{SyncError, SyncSession, SyncStatus};
use serde_json::json;
use uuid::Uuid;

use super::fixtures::Harness;

#[tokio::test]
async fn test_offline_set_log_pushed_once_under_new_identity() {
    let h = Harness::new();
    let ctx = h.store.context();
    let squat = h.store.add_exercise(&ctx, "Back Squat", Some("squat")).unwrap();
    h.store.start_session(&ctx, &[], &[squat]).unwrap();
    let log_id = h
        .store
        .log_set(&ctx, SetLogDraft::new(squat, 140.0, 5))
        .unwrap()
        .unwrap();

    // Nothing leaves the device while signed out.
    assert_eq!(h.backend.request_count(), 0);

    let report = h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();
    assert!(report.initial_sync.unwrap().is_success());

    let log: SetLog = h.store.get(&log_id).unwrap();
    assert_eq!(log.meta.user_id, "user-1");

    let remote = h.backend.rows(CollectionName::SetLogs);
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0]["id"], json!(log_id.to_string()));
    assert_eq!(remote[0]["user_id"], json!("user-1"));

    h.sync().sync_now().await.unwrap();

    let pushes = h
        .backend
        .upserts()
        .into_iter()
        .filter(|u| u.id == log_id.to_string())
        .count();
    assert_eq!(pushes, 1);
    assert_eq!(h.store.pending_len(), 0);
}

#[tokio::test]
async fn test_failed_push_stays_queued_and_retries() {
    let h = Harness::new();
    let ctx = h.store.context();
    h.store.add_exercise(&ctx, "Front Squat", None).unwrap();

    h.backend.set_offline(true);
    let report = h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();

    let initial = report.initial_sync.unwrap();
    assert!(!initial.is_success());
    assert!(initial.is_transient_failure());
    assert_eq!(h.store.pending(CollectionName::Exercises).len(), 1);

    h.backend.set_offline(false);
    let retry = h.sync().sync_now().await.unwrap();

    assert_eq!(retry.pushed, 1);
    assert_eq!(h.store.pending_len(), 0);
    assert_eq!(h.backend.rows_for(CollectionName::Exercises, "user-1").len(), 1);
}

#[tokio::test]
async fn test_worker_pushes_after_local_write() {
    let h = Harness::new();
    h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();
    let ctx = h.store.context();

    let id = h.store.add_exercise(&ctx, "Pendlay Row", None).unwrap();

    let mut pushed = false;
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        if h.store.pending_len() == 0 {
            pushed = true;
            break;
        }
    }

    assert!(pushed, "worker did not push the new exercise");
    assert!(h
        .backend
        .rows(CollectionName::Exercises)
        .iter()
        .any(|r| r["id"] == json!(id.to_string())));
}

#[tokio::test]
async fn test_pull_applies_last_write_wins() {
    let h = Harness::new();
    let ctx = h.store.identity().set(Identity::User("user-1".to_string()));
    let local = h.store.add_exercise(&ctx, "Bench Press", Some("bench")).unwrap();
    let stale_target = h.store.add_exercise(&ctx, "Overhead Press", None).unwrap();
    let now = Utc::now();

    // Newer remote edit from another device.
    h.backend.put_row(
        CollectionName::Exercises,
        json!({
            "id": local.to_string(),
            "user_id": "user-1",
            "created_at": now.to_rfc3339(),
            "updated_at": (now + Duration::minutes(5)).to_rfc3339(),
            "deleted": false,
            "name": "Bench Press (paused)",
            "category": "bench"
        }),
    );
    // Older remote copy loses to the local one.
    h.backend.put_row(
        CollectionName::Exercises,
        json!({
            "id": stale_target.to_string(),
            "user_id": "user-1",
            "created_at": (now - Duration::days(2)).to_rfc3339(),
            "updated_at": (now - Duration::days(1)).to_rfc3339(),
            "deleted": false,
            "name": "Old Press",
            "category": null
        }),
    );
    // A record this device has never seen.
    let remote_only = Uuid::new_v4();
    h.backend.put_row(
        CollectionName::Exercises,
        json!({
            "id": remote_only.to_string(),
            "user_id": "user-1",
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
            "deleted": false,
            "name": "Zercher Squat",
            "category": null
        }),
    );

    let report = h
        .sync()
        .enable_all(SyncSession::new(ctx, Some("token".to_string())))
        .await
        .unwrap();

    assert_eq!(report.pulled, 3);
    assert_eq!(report.merged, 2);
    assert_eq!(report.kept_local, 1);

    assert_eq!(h.store.get::<Exercise>(&local).unwrap().name, "Bench Press (paused)");
    assert_eq!(h.store.get::<Exercise>(&stale_target).unwrap().name, "Overhead Press");
    assert!(h.store.get::<Exercise>(&remote_only).is_some());
    assert_eq!(
        h.store.cursor(CollectionName::Exercises).map(|c| c.timestamp()),
        Some((now + Duration::minutes(5)).timestamp())
    );

    // The local winner is pushed back; the remote winner is not re-pushed.
    let pushed_ids: Vec<String> = h.backend.upserts().into_iter().map(|u| u.id).collect();
    assert!(pushed_ids.contains(&stale_target.to_string()));
    assert!(!pushed_ids.contains(&local.to_string()));
}

#[tokio::test]
async fn test_remote_tombstone_wins_tie() {
    let h = Harness::new();
    let ctx = h.store.identity().set(Identity::User("user-1".to_string()));
    let id = h.store.add_exercise(&ctx, "Good Morning", None).unwrap();
    let local: Exercise = h.store.get(&id).unwrap();

    h.backend.put_row(
        CollectionName::Exercises,
        json!({
            "id": id.to_string(),
            "user_id": "user-1",
            "created_at": local.meta.created_at.to_rfc3339(),
            "updated_at": local.meta.updated_at.to_rfc3339(),
            "deleted": true,
            "name": "Good Morning",
            "category": null
        }),
    );

    h.sync()
        .enable_all(SyncSession::new(ctx, None))
        .await
        .unwrap();

    assert!(h.store.get_live::<Exercise>(&id).is_none());
    assert!(h.store.get::<Exercise>(&id).unwrap().meta.deleted);
}

#[tokio::test]
async fn test_enable_requires_authenticated_context() {
    let h = Harness::new();
    let result = h.sync().enable_all(SyncSession::new(h.store.context(), None)).await;

    assert_eq!(result, Err(SyncError::AuthorizationRequired));
    assert_eq!(h.sync().status(CollectionName::Exercises), SyncStatus::Disabled);
    assert_eq!(h.sync().sync_now().await, Err(SyncError::Disabled));
}

#[tokio::test]
async fn test_switching_user_pulls_rows_older_than_previous_cursor() {
    let h = Harness::new();
    let now = Utc::now();
    let older = Uuid::new_v4();
    let newer = Uuid::new_v4();

    let row = |id: Uuid, user: &str, at: chrono::DateTime<Utc>, name: &str| {
        json!({
            "id": id.to_string(),
            "user_id": user,
            "created_at": at.to_rfc3339(),
            "updated_at": at.to_rfc3339(),
            "deleted": false,
            "name": name,
            "category": null
        })
    };
    h.backend.put_row(
        CollectionName::Exercises,
        row(older, "user-2", now - Duration::hours(1), "Belt Squat"),
    );
    h.backend
        .put_row(CollectionName::Exercises, row(newer, "user-1", now, "Sumo Deadlift"));

    h.coordinator.sign_in("lifter@example.com", "pw").await.unwrap();
    assert!(h.store.get::<Exercise>(&newer).is_some());
    assert_eq!(h.store.cursor(CollectionName::Exercises), Some(now));

    h.coordinator.sign_out().await.unwrap();
    let report = h.coordinator.sign_in("other@example.com", "pw").await.unwrap();

    let initial = report.initial_sync.unwrap();
    assert!(initial.is_success());
    assert!(initial.pulled >= 1);
    let pulled: Exercise = h.store.get(&older).unwrap();
    assert_eq!(pulled.meta.user_id, "user-2");
    assert_eq!(
        h.store.cursor_for(CollectionName::Exercises, "user-2"),
        Some(now - Duration::hours(1))
    );
    assert_eq!(h.store.cursor_for(CollectionName::Exercises, "user-1"), None);
}
