use std::{future::Future, ops::Deref};

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::entities::ActivityEvent;

/// Interface for abstracting storage of the event log.
pub trait EventStore {
    /// Adds an event at the end of the log.
    fn append(&self, event: ActivityEvent) -> impl Future<Output = Result<()>>;

    /// Retrieves events with `start <= timestamp < end`, ordered by timestamp. Events with equal
    /// timestamps keep the order they were appended in.
    fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityEvent>>> + Send;

    /// Removes every event older than `cutoff`. Returns the amount of removed events.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> impl Future<Output = Result<usize>>;
}

impl<T: Deref> EventStore for T
where
    T::Target: EventStore,
{
    fn append(&self, event: ActivityEvent) -> impl Future<Output = Result<()>> {
        self.deref().append(event)
    }

    fn query_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<ActivityEvent>>> + Send {
        self.deref().query_range(start, end)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> impl Future<Output = Result<usize>> {
        self.deref().delete_older_than(cutoff)
    }
}
