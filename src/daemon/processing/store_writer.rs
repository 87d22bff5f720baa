use anyhow::Result;

use crate::daemon::storage::{entities::ActivityEvent, event_store::EventStore};

use super::module::EventProcessor;

/// Bridges [ProcessingModule](super::ProcessingModule) and an [EventStore].
pub struct StoreWriter<S: EventStore> {
    store: S,
}

impl<S: EventStore> StoreWriter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: EventStore> EventProcessor for StoreWriter<S> {
    async fn process_next(&mut self, event: ActivityEvent) -> Result<()> {
        self.store.append(event).await
    }

    async fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}
