//! Integration test modules.

mod auth_flow_test;
mod fixtures;
mod migration_test;
mod program_generation_test;
mod sync_race_test;
mod sync_test;
