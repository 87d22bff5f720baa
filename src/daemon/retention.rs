use anyhow::Result;
use chrono::{Duration, Local};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    daemon::storage::event_store::EventStore,
    utils::{clock::Clock, time::next_day_start},
};

/// How long events are kept by default.
pub const DEFAULT_RETENTION: Duration = Duration::days(7);

/// Removes events older than the retention window. Runs once at startup and then every local
/// midnight.
pub struct RetentionModule<S: EventStore> {
    store: S,
    time_provider: Box<dyn Clock>,
    retention: Duration,
    shutdown: CancellationToken,
}

impl<S: EventStore> RetentionModule<S> {
    pub fn new(
        store: S,
        time_provider: Box<dyn Clock>,
        retention: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            time_provider,
            retention,
            shutdown,
        }
    }

    /// Prunes once. Returns the amount of removed events.
    pub async fn prune(&self) -> Result<usize> {
        let cutoff = self.time_provider.time() - self.retention;
        let removed = self.store.delete_older_than(cutoff).await?;
        info!("Pruned {removed} events older than {cutoff}");
        Ok(removed)
    }

    pub async fn run(self) {
        loop {
            if let Err(e) = self.prune().await {
                error!("Failed to prune old events {e:?}");
            }

            let now = self.time_provider.time().with_timezone(&Local);
            let until_midnight = (next_day_start(now) - now)
                .to_std()
                .unwrap_or_default();

            tokio::select! {
                _ = self.shutdown.cancelled() => return,
                _ = self.time_provider.sleep(until_midnight) => (),
            }
        }
    }
}
