use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use collection::{
    activation::ActivationWatcher,
    idle::IdleEvaluator,
    recorder::{EventRecorder, RecorderConfig},
};
use processing::{store_writer::StoreWriter, ProcessingModule};
use retention::RetentionModule;
use status::{RecorderStatus, StatusFile, StatusModule};
use storage::{day_files::DayFileStore, entities::ActivityEvent, event_store::EventStore};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    sampler::{FrontmostApp, GenericSampler, Sampler},
    utils::clock::{Clock, DefaultClock},
};

pub mod args;
pub mod collection;
pub mod processing;
pub mod retention;
pub mod shutdown;
pub mod status;
pub mod storage;

/// Directory inside the application directory that holds the event log.
pub const EVENTS_DIR: &str = "events";

const DEFAULT_ACTIVATION_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the starting point for the daemon
pub async fn start_daemon(
    dir: PathBuf,
    config: RecorderConfig,
    retention: chrono::Duration,
) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<ActivityEvent>(32);
    let (activation_sender, activation_receiver) = mpsc::channel::<FrontmostApp>(4);
    let (status_sender, status_receiver) = watch::channel(RecorderStatus::default());

    let shutdown_token = CancellationToken::new();

    let store = Arc::new(DayFileStore::new(dir.join(EVENTS_DIR))?);

    let recorder = create_recorder(
        sender,
        GenericSampler::new()?,
        status_sender,
        &config,
        DefaultClock,
    );
    let watcher = create_activation_watcher(
        activation_sender,
        GenericSampler::new()?,
        &shutdown_token,
        DefaultClock,
    );
    let processor = create_processor(store.clone(), receiver);
    let retention = RetentionModule::new(
        store,
        Box::new(DefaultClock),
        retention,
        shutdown_token.clone(),
    );
    let status = StatusModule::new(StatusFile::in_dir(&dir), status_receiver);

    info!("Starting daemon in {dir:?} with {config:?}");

    let (_, recording_result, activation_result, processing_result, _, status_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        recorder.run(activation_receiver, config, shutdown_token.clone()),
        watcher.run(),
        processor.run(),
        retention.run(),
        status.run(),
    );

    if let Err(recording_result) = recording_result {
        error!("Recording module got an error {:?}", recording_result);
    }

    if let Err(activation_result) = activation_result {
        error!("Activation module got an error {:?}", activation_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    if let Err(status_result) = status_result {
        error!("Status module got an error {:?}", status_result);
    }

    Ok(())
}

fn create_recorder(
    sender: mpsc::Sender<ActivityEvent>,
    sampler: impl Sampler + 'static,
    status: watch::Sender<RecorderStatus>,
    config: &RecorderConfig,
    clock: impl Clock,
) -> EventRecorder {
    EventRecorder::new(
        sender,
        Box::new(sampler),
        IdleEvaluator::from_seconds(config.idle_threshold_s),
        Box::new(clock),
        status,
    )
}

fn create_activation_watcher(
    sender: mpsc::Sender<FrontmostApp>,
    sampler: impl Sampler + 'static,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> ActivationWatcher {
    ActivationWatcher::new(
        sender,
        Box::new(sampler),
        shutdown_token.clone(),
        DEFAULT_ACTIVATION_INTERVAL,
        Box::new(clock),
    )
}

fn create_processor<S: EventStore>(
    store: S,
    receiver: mpsc::Receiver<ActivityEvent>,
) -> ProcessingModule<StoreWriter<S>> {
    ProcessingModule::new(receiver, StoreWriter::new(store))
}
