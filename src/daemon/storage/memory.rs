use std::sync::Mutex;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use super::{entities::ActivityEvent, event_store::EventStore};

/// Keeps the whole log in memory. Used for tests and for callers that only need a short lived
/// log.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<ActivityEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: impl IntoIterator<Item = ActivityEvent>) -> Self {
        Self {
            events: Mutex::new(events.into_iter().collect()),
        }
    }

    /// Returns a copy of every stored event in insertion order.
    pub fn snapshot(&self) -> Result<Vec<ActivityEvent>> {
        let events = self
            .events
            .lock()
            .map_err(|_| anyhow!("Memory store lock was poisoned"))?;
        Ok(events.clone())
    }
}

impl EventStore for MemoryStore {
    async fn append(&self, event: ActivityEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow!("Memory store lock was poisoned"))?
            .push(event);
        Ok(())
    }

    async fn query_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ActivityEvent>> {
        let mut selected = self
            .snapshot()?
            .into_iter()
            .filter(|v| v.timestamp >= start && v.timestamp < end)
            .collect::<Vec<_>>();
        // stable, so equal timestamps keep insertion order
        selected.sort_by_key(|v| v.timestamp);
        Ok(selected)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow!("Memory store lock was poisoned"))?;
        let before = events.len();
        events.retain(|v| v.timestamp >= cutoff);
        Ok(before - events.len())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};

    use crate::daemon::storage::{
        entities::{ActivityEvent, EventType},
        event_store::EventStore,
    };

    use super::MemoryStore;

    #[tokio::test]
    async fn query_range_keeps_insertion_order_for_ties() -> Result<()> {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let store = MemoryStore::new();
        store
            .append(ActivityEvent::new(start + Duration::seconds(5), "late", EventType::Change))
            .await?;
        store
            .append(ActivityEvent::new(start, "first", EventType::Change))
            .await?;
        store
            .append(ActivityEvent::new(start, "second", EventType::Heartbeat))
            .await?;

        let events = store.query_range(start, start + Duration::minutes(1)).await?;
        let names = events.iter().map(|v| &*v.app_name).collect::<Vec<_>>();
        assert_eq!(names, vec!["first", "second", "late"]);

        let events = store.query_range(start + Duration::seconds(1), start + Duration::seconds(5)).await?;
        assert!(events.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_older_than_removes_only_old_events() -> Result<()> {
        let start = Utc.with_ymd_and_hms(2018, 7, 4, 9, 0, 0).unwrap();
        let store = MemoryStore::with_events([
            ActivityEvent::new(start - Duration::days(8), "old", EventType::Change),
            ActivityEvent::new(start, "new", EventType::Change),
        ]);

        let removed = store.delete_older_than(start - Duration::days(7)).await?;

        assert_eq!(removed, 1);
        assert_eq!(store.snapshot()?.len(), 1);
        Ok(())
    }
}
