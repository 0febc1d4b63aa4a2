//! Shared setup for integration tests.

use std::sync::Arc;

use liftlog::auth::{AuthCoordinator, MemoryAuth};
use liftlog::storage::SyncSettings;
use liftlog::store::Store;
use liftlog::sync::{MemoryBackend, SyncController};

/// Short intervals so worker loops finish quickly.
pub fn fast_settings() -> SyncSettings {
    SyncSettings {
        retry_initial_ms: 10,
        retry_max_ms: 40,
        realtime_poll_ms: 20,
        push_batch_size: 25,
        ..SyncSettings::default()
    }
}

pub struct Harness {
    pub store: Store,
    pub backend: Arc<MemoryBackend>,
    pub auth: Arc<MemoryAuth>,
    pub coordinator: AuthCoordinator<MemoryAuth, MemoryBackend>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Store::open_in_memory().unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let auth = Arc::new(MemoryAuth::new());
        let sync = SyncController::new(store.clone(), Arc::clone(&backend), fast_settings());
        let coordinator = AuthCoordinator::new(Arc::clone(&auth), store.clone(), sync);

        auth.add_user("lifter@example.com", "pw", "user-1");
        auth.add_user("other@example.com", "pw", "user-2");

        Self {
            store,
            backend,
            auth,
            coordinator,
        }
    }

    pub fn sync(&self) -> &SyncController<MemoryBackend> {
        self.coordinator.sync()
    }
}
