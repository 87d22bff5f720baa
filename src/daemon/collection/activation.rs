use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::{
    sampler::{FrontmostApp, Sampler},
    utils::clock::Clock,
};

/// Produces "frontmost application changed" notifications on platforms that don't have them, by
/// polling a sampler of its own and reporting every change of the application name.
pub struct ActivationWatcher {
    next: mpsc::Sender<FrontmostApp>,
    producer: Box<dyn Sampler>,
    shutdown: CancellationToken,
    poll_frequency: Duration,
    time_provider: Box<dyn Clock>,
    last_app: Option<Arc<str>>,
}

impl ActivationWatcher {
    pub fn new(
        next: mpsc::Sender<FrontmostApp>,
        producer: Box<dyn Sampler>,
        shutdown: CancellationToken,
        poll_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            producer,
            shutdown,
            poll_frequency,
            time_provider,
            last_app: None,
        }
    }

    fn detect_change(&mut self) -> Option<FrontmostApp> {
        let app = self.producer.frontmost_app()?;
        if self.last_app.as_deref() == Some(&*app.name) {
            return None;
        }
        self.last_app = Some(app.name.clone());
        Some(app)
    }

    /// Executes the watcher event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut collection_point = self.time_provider.instant();
        loop {
            collection_point += self.poll_frequency;

            if let Some(app) = self.detect_change() {
                let span = info_span!("Publishing activation");
                debug!("Foreground application changed to {}", app.name);
                if self.next.send(app).instrument(span).await.is_err() {
                    info!("Recorder is gone, stopping activation watcher");
                    return Ok(());
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        sampler::{AppHandle, FrontmostApp, MockSampler},
        utils::clock::DefaultClock,
    };

    use super::ActivationWatcher;

    fn app(name: &str) -> FrontmostApp {
        FrontmostApp {
            name: name.into(),
            bundle_id: None,
            handle: AppHandle(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn only_changes_are_published() -> Result<()> {
        let mut sampler = MockSampler::new();
        let mut samples = vec![
            Some(app("Terminal")),
            Some(app("Terminal")),
            None,
            Some(app("Firefox")),
            Some(app("Firefox")),
            Some(app("Terminal")),
        ]
        .into_iter();
        sampler
            .expect_frontmost_app()
            .returning(move || samples.next().flatten());

        let (sender, mut receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();
        let watcher = ActivationWatcher::new(
            sender,
            Box::new(sampler),
            shutdown.clone(),
            Duration::from_secs(1),
            Box::new(DefaultClock),
        );

        let (result, _) = tokio::join!(watcher.run(), async {
            tokio::time::sleep(Duration::from_millis(7500)).await;
            shutdown.cancel();
        });
        result?;

        let mut names = vec![];
        while let Ok(app) = receiver.try_recv() {
            names.push(app.name.to_string());
        }
        assert_eq!(names, vec!["Terminal", "Firefox", "Terminal"]);
        Ok(())
    }
}
