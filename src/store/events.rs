//! Change notifications for collection observers.

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::CollectionName;
use crate::store::{Collections, Store};

/// Where a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A write made through the store API
    Local,
    /// A merge of rows pulled from the remote backend
    Remote,
}

/// Records of one collection changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: CollectionName,
    pub ids: Vec<Uuid>,
    pub origin: ChangeOrigin,
}

impl ChangeEvent {
    pub fn local(collection: CollectionName, ids: Vec<Uuid>) -> Self {
        Self {
            collection,
            ids,
            origin: ChangeOrigin::Local,
        }
    }

    pub fn remote(collection: CollectionName, ids: Vec<Uuid>) -> Self {
        Self {
            collection,
            ids,
            origin: ChangeOrigin::Remote,
        }
    }
}

/// A value derived from the collections, recomputed when one of its
/// source collections changes.
pub struct DerivedView<R> {
    store: Store,
    receiver: broadcast::Receiver<ChangeEvent>,
    sources: Vec<CollectionName>,
    select: Box<dyn Fn(&Collections) -> R + Send + Sync>,
    value: R,
}

impl<R> DerivedView<R> {
    /// Compute the view now and start listening for changes to `sources`.
    pub fn new(
        store: &Store,
        sources: &[CollectionName],
        select: impl Fn(&Collections) -> R + Send + Sync + 'static,
    ) -> Self {
        // Subscribe before computing so no change slips in between
        let receiver = store.subscribe();
        let value = store.view(&select);

        Self {
            store: store.clone(),
            receiver,
            sources: sources.to_vec(),
            select: Box::new(select),
            value,
        }
    }

    /// Last computed value.
    pub fn current(&self) -> &R {
        &self.value
    }

    /// Wait for a relevant change, recompute and return the new value.
    ///
    /// Returns `None` if the change channel has closed.
    pub async fn changed(&mut self) -> Option<&R> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.sources.contains(&event.collection) => break,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("Derived view lagged by {} events; recomputing", skipped);
                    break;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }

        self.value = self.store.view(&self.select);
        Some(&self.value)
    }
}
