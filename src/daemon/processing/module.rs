use anyhow::Result;

use crate::daemon::storage::entities::ActivityEvent;

/// Represents an event processor. Anything that wants to see recorded events, the event log
/// first of all, implements this.
pub trait EventProcessor {
    fn process_next(&mut self, event: ActivityEvent) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
