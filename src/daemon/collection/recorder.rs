use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    sync::{mpsc, watch},
    time::{interval_at, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, instrument, Instrument};

use crate::{
    daemon::{
        status::RecorderStatus,
        storage::entities::{ActivityEvent, EventType},
    },
    sampler::{FrontmostApp, Sampler},
    utils::clock::Clock,
};

use super::idle::IdleEvaluator;

/// How often the recorder looks at the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    pub window_poll: Duration,
    pub heartbeat: Duration,
    pub idle_poll: Duration,
    pub idle_threshold_s: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            window_poll: Duration::from_secs(3),
            heartbeat: Duration::from_secs(60),
            idle_poll: Duration::from_secs(10),
            idle_threshold_s: 300,
        }
    }
}

/// Everything that can make the recorder act. Triggers are handled one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The foreground application changed to this one.
    Activated(FrontmostApp),
    WindowPoll,
    Heartbeat,
    IdlePoll,
}

#[derive(Debug, Default)]
struct RecorderState {
    current_app: Option<Arc<str>>,
    current_bundle_id: Option<Arc<str>>,
    current_window_title: Option<Arc<str>>,
    is_idle: bool,
    is_tracking: bool,
}

/// State machine that turns samples into [ActivityEvent]s. The recorder owns its state, so
/// running it as a single task is what keeps transitions from interleaving.
pub struct EventRecorder {
    next: mpsc::Sender<ActivityEvent>,
    sampler: Box<dyn Sampler>,
    idle_evaluator: IdleEvaluator,
    time_provider: Box<dyn Clock>,
    status: watch::Sender<RecorderStatus>,
    state: RecorderState,
}

fn ticker(start: tokio::time::Instant, period: Duration) -> Interval {
    let mut interval = interval_at(start + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl EventRecorder {
    pub fn new(
        next: mpsc::Sender<ActivityEvent>,
        sampler: Box<dyn Sampler>,
        idle_evaluator: IdleEvaluator,
        time_provider: Box<dyn Clock>,
        status: watch::Sender<RecorderStatus>,
    ) -> Self {
        Self {
            next,
            sampler,
            idle_evaluator,
            time_provider,
            status,
            state: RecorderState::default(),
        }
    }

    /// Records whatever is in the foreground right now.
    #[instrument(skip(self))]
    pub async fn start(&mut self) {
        self.state.is_tracking = true;
        if let Some(app) = self.sampler.frontmost_app() {
            let title = self.sampler.window_title(app.handle);
            self.state.current_app = Some(app.name);
            self.state.current_bundle_id = app.bundle_id;
            self.state.current_window_title = title.map(Into::into);
            self.emit(EventType::Change).await;
        } else {
            debug!("Nothing is in the foreground yet");
        }
        self.publish_status();
    }

    pub async fn handle(&mut self, trigger: Trigger) {
        match trigger {
            Trigger::Activated(app) => self.on_activation(app).await,
            Trigger::WindowPoll => self.poll_window().await,
            Trigger::Heartbeat => self.heartbeat().await,
            Trigger::IdlePoll => self.poll_idle().await,
        }
        self.publish_status();
    }

    /// Executes the recorder event loop until `shutdown` is cancelled.
    pub async fn run(
        mut self,
        mut activations: mpsc::Receiver<FrontmostApp>,
        config: RecorderConfig,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let start = self.time_provider.instant();
        let mut window_poll = ticker(start, config.window_poll);
        let mut heartbeat = ticker(start, config.heartbeat);
        let mut idle_poll = ticker(start, config.idle_poll);
        let mut activations_open = true;

        self.start().await;

        loop {
            let trigger = tokio::select! {
                _ = shutdown.cancelled() => break,
                activation = activations.recv(), if activations_open => match activation {
                    Some(app) => Trigger::Activated(app),
                    None => {
                        info!("Activation source closed, relying on polling");
                        activations_open = false;
                        continue;
                    }
                },
                _ = window_poll.tick() => Trigger::WindowPoll,
                _ = heartbeat.tick() => Trigger::Heartbeat,
                _ = idle_poll.tick() => Trigger::IdlePoll,
            };
            self.handle(trigger).await;
        }

        self.state.is_tracking = false;
        self.publish_status();
        info!("Recorder stopped");
        Ok(())
    }

    async fn on_activation(&mut self, app: FrontmostApp) {
        if self.state.current_app.as_deref() == Some(&*app.name) {
            return;
        }

        let title = self.sampler.window_title(app.handle);
        self.state.current_app = Some(app.name);
        self.state.current_bundle_id = app.bundle_id;
        self.state.current_window_title = title.map(Into::into);

        // Switching applications is input, so an idle period is over.
        if self.state.is_idle {
            self.state.is_idle = false;
            self.emit(EventType::IdleEnd).await;
        }
        self.emit(EventType::Change).await;
    }

    async fn poll_window(&mut self) {
        let Some(app) = self.sampler.frontmost_app() else {
            return;
        };
        if self.state.current_app.as_deref() != Some(&*app.name) {
            // Application switches are the activation source's business.
            return;
        }
        let Some(title) = self.sampler.window_title(app.handle) else {
            return;
        };
        if self.state.current_window_title.as_deref() == Some(title.as_str()) {
            return;
        }

        self.state.current_window_title = Some(title.into());
        self.emit(EventType::Change).await;
    }

    async fn heartbeat(&mut self) {
        if self.state.is_idle {
            return;
        }
        self.emit(EventType::Heartbeat).await;
    }

    async fn poll_idle(&mut self) {
        let Some(idle_seconds) = self.sampler.idle_seconds() else {
            return;
        };

        match (self.idle_evaluator.is_idle(idle_seconds), self.state.is_idle) {
            (true, false) => {
                info!("User went idle after {idle_seconds}s without input");
                self.state.is_idle = true;
                self.emit(EventType::IdleStart).await;
            }
            (false, true) => {
                info!("User is back");
                self.state.is_idle = false;
                self.emit(EventType::IdleEnd).await;
            }
            _ => (),
        }
    }

    /// Hands an event over to processing. A failed hand-off loses the event but the recorder
    /// keeps going.
    async fn emit(&mut self, event_type: EventType) {
        let Some(app_name) = self.state.current_app.clone() else {
            debug!("No application observed yet, skipping {event_type}");
            return;
        };

        let event = ActivityEvent {
            timestamp: self.time_provider.time(),
            app_name,
            bundle_id: self.state.current_bundle_id.clone(),
            window_title: self.state.current_window_title.clone(),
            is_idle: self.state.is_idle,
            event_type,
        };

        let span = info_span!("Sending activity event");
        debug!("Sending event {:?}", event);
        if let Err(e) = self.next.send(event).instrument(span).await {
            error!("Unexpected error during sending, event is lost {e:?}");
        }
    }

    /// Watchers are only woken when something they can see actually changed.
    fn publish_status(&self) {
        let next = RecorderStatus {
            is_tracking: self.state.is_tracking,
            is_idle: self.state.is_idle,
            current_app: self.state.current_app.clone(),
            current_window_title: self.state.current_window_title.clone(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
