//! Derived views over selectors.

use liftlog::programs::{create_program_from_maxes, MainLiftMaxes};
use liftlog::selectors::{week_completion, COMPLETION_INPUTS};
use liftlog::store::{ChangeOrigin, DerivedView, Store};

#[tokio::test]
async fn test_week_completion_view_tracks_sessions() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let maxes = MainLiftMaxes {
        squat: 100.0,
        bench: 70.0,
        deadlift: 120.0,
        press: 45.0,
    };
    let program_id = create_program_from_maxes(&store, &ctx, maxes).unwrap();

    let mut view = DerivedView::new(&store, &COMPLETION_INPUTS, move |c| {
        week_completion(c, &program_id, 1)
    });
    assert_eq!(view.current().total_days, 4);
    assert!(view.current().completed_day_ids.is_empty());

    let day = store.view(|c| {
        liftlog::selectors::week_workouts(c, &program_id, 1)[0].meta.id
    });
    let session = store.add_workout_session(&ctx, Some(day)).unwrap();
    store.complete_session(&session, None).unwrap();

    // One event for the insert, one per completed field.
    let mut latest = view.changed().await.unwrap().clone();
    while latest.completed_day_ids.is_empty() {
        latest = view.changed().await.unwrap().clone();
    }
    assert!(latest.completed_day_ids.contains(&day));
    assert!(!latest.all_complete);
}

#[tokio::test]
async fn test_change_events_carry_origin() {
    let store = Store::open_in_memory().unwrap();
    let mut events = store.subscribe();
    let ctx = store.context();

    let id = store.add_exercise(&ctx, "Farmer Carry", None).unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(event.origin, ChangeOrigin::Local);
    assert_eq!(event.ids, vec![id]);
}
