//! Training programs: default catalog, generation, wizard builds and
//! cascading deletes.

pub mod cascade;
pub mod catalog;
pub mod generator;
pub mod wizard;

pub use cascade::{delete_program, CascadeReport};
pub use catalog::{MainLift, DEFAULT_EXERCISES, DEFAULT_PROGRAM_NAME};
pub use generator::{
    create_program_from_maxes, generate_program, generate_program_with, seed_default_exercises,
    ExerciseIds, MainLiftMaxes, ProgramSink, StoreSink,
};
pub use wizard::{
    generate_program_from_wizard, generate_program_from_wizard_with, ProgressionRule,
    WizardConfig, WizardExercise, WizardSession,
};
