//! Local data migration.
//!
//! Reassigns records created anonymously to the identity that just signed
//! in. The pass is best-effort: one failing record is reported and skipped,
//! and the next login picks it up again because ownership is re-checked by
//! value rather than tracked with a flag.

use uuid::Uuid;

use crate::model::{CollectionName, WriteContext};
use crate::store::{Store, StoreError};

/// A record that could not be reassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFailure {
    pub collection: CollectionName,
    pub id: Uuid,
    pub error: String,
}

/// Summary of one migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records whose owner was changed
    pub reassigned: usize,
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Move every placeholder-owned record (tombstones included) to `target`.
pub fn migrate_local_data(store: &Store, target: &WriteContext) -> Result<MigrationReport, StoreError> {
    if target.is_placeholder() {
        return Err(StoreError::Validation(
            "cannot migrate local data to the placeholder identity".to_string(),
        ));
    }

    let mut report = MigrationReport::default();
    let batch = store.batch();

    for collection in CollectionName::ALL {
        for id in store.placeholder_owned(collection) {
            match store.reassign_owner(collection, &id, &target.user_id) {
                Ok(true) => report.reassigned += 1,
                Ok(false) => {}
                Err(e) => report.failures.push(MigrationFailure {
                    collection,
                    id,
                    error: e.to_string(),
                }),
            }
        }
    }

    drop(batch);

    if report.failures.is_empty() {
        tracing::info!(
            "Migrated {} local record(s) to {}",
            report.reassigned,
            target.user_id
        );
    } else {
        tracing::warn!(
            "Migrated {} local record(s) to {}; {} failed and stay local until next sign-in",
            report.reassigned,
            target.user_id,
            report.failures.len()
        );
        for failure in &report.failures {
            tracing::debug!(
                "Migration failure {} {}: {}",
                failure.collection,
                failure.id,
                failure.error
            );
        }
    }

    Ok(report)
}
