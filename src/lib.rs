//! LiftLog - Local-first Strength Program Tracker
//!
//! Keeps exercises, programs and workout logs in a durable local store,
//! merges them with a remote backend once the user signs in, and moves
//! anonymous data to the signed-in account without loss or duplication.

pub mod auth;
pub mod migration;
pub mod model;
pub mod programs;
pub mod selectors;
pub mod storage;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use auth::{AuthCoordinator, AuthProvider, AuthSession};
pub use model::{CollectionName, Identity, WriteContext};
pub use storage::config::AppConfig;
pub use storage::database::Database;
pub use store::{Store, StoreError};
pub use sync::{RemoteBackend, SyncController, SyncError};
