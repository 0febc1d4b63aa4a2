//! Wizard-built custom programs.

use liftlog::model::{Program, WorkoutSet};
use liftlog::programs::{
    generate_program_from_wizard, ProgressionRule, WizardConfig, WizardExercise, WizardSession,
};
use liftlog::selectors::{week_workouts, workout_day_sets};
use liftlog::store::{Store, StoreError};
use uuid::Uuid;

fn weighted(exercise_id: Uuid, progression: ProgressionRule) -> WizardExercise {
    WizardExercise {
        exercise_id,
        exercise_name: "Dumbbell Row".to_string(),
        sets: 2,
        reps: 12,
        percentage: None,
        weight: Some(30.0),
        progression,
    }
}

#[test]
fn test_weight_progression_stored_per_week() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();
    let row = store.add_exercise(&ctx, "Dumbbell Row", None).unwrap();

    let config = WizardConfig {
        program_name: "Back Builder".to_string(),
        weeks_count: 4,
        sessions: vec![WizardSession {
            name: "Pull".to_string(),
            exercises: vec![weighted(row, ProgressionRule::IncrementWeight { amount: 2.5 })],
        }],
    };

    let program_id = generate_program_from_wizard(&store, &ctx, &config).unwrap();

    let program: Program = store.get(&program_id).unwrap();
    let stored: WizardConfig =
        serde_json::from_value(program.wizard_config.clone().unwrap()).unwrap();
    assert_eq!(stored, config);

    let week4 = store.view(|c| week_workouts(c, &program_id, 4));
    assert_eq!(week4.len(), 1);
    assert_eq!(week4[0].name.as_deref(), Some("Pull"));

    let sets = store.view(|c| workout_day_sets(c, &week4[0].meta.id));
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].exercise_name, "Dumbbell Row");
    assert_eq!(sets[0].set.weight_kg, Some(37.5));
    assert_eq!(sets[0].set.percentage_of_max, None);
}

#[test]
fn test_invalid_wizard_config_writes_nothing() {
    let store = Store::open_in_memory().unwrap();
    let ctx = store.context();

    let config = WizardConfig {
        program_name: "Too Long".to_string(),
        weeks_count: 60,
        sessions: vec![WizardSession {
            name: "A".to_string(),
            exercises: vec![weighted(Uuid::new_v4(), ProgressionRule::Fixed)],
        }],
    };

    assert!(matches!(
        generate_program_from_wizard(&store, &ctx, &config),
        Err(StoreError::Validation(_))
    ));
    assert!(store.live::<Program>().is_empty());
    assert!(store.live::<WorkoutSet>().is_empty());
    assert_eq!(store.pending_len(), 0);
}
