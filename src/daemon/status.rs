use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

const STATUS_FILE_NAME: &str = "status.json";

/// What the recorder is doing right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStatus {
    pub is_tracking: bool,
    pub is_idle: bool,
    pub current_app: Option<Arc<str>>,
    pub current_window_title: Option<Arc<str>>,
}

/// Status shared between the daemon and the cli through the application directory.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(STATUS_FILE_NAME),
        }
    }

    pub async fn write(&self, status: &RecorderStatus) -> Result<()> {
        // Written next to the target and renamed, so readers never see half a file.
        let temporary = self.path.with_extension("json.tmp");
        tokio::fs::write(&temporary, serde_json::to_vec(status)?).await?;
        tokio::fs::rename(&temporary, &self.path).await?;
        Ok(())
    }

    /// Missing file means the daemon has never run in this directory.
    pub async fn read(&self) -> Result<RecorderStatus> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RecorderStatus::default()),
            Err(e) => Err(e)?,
        }
    }
}

/// Mirrors every status published by the recorder into a [StatusFile].
pub struct StatusModule {
    file: StatusFile,
    receiver: watch::Receiver<RecorderStatus>,
}

impl StatusModule {
    pub fn new(file: StatusFile, receiver: watch::Receiver<RecorderStatus>) -> Self {
        Self { file, receiver }
    }

    pub async fn run(mut self) -> Result<()> {
        while self.receiver.changed().await.is_ok() {
            let status = self.receiver.borrow_and_update().clone();
            debug!("Persisting status {status:?}");
            if let Err(e) = self.file.write(&status).await {
                error!("Failed to persist status {e:?}");
            }
        }

        // The recorder is gone, whatever it said last it isn't tracking anymore.
        let last = RecorderStatus {
            is_tracking: false,
            ..self.receiver.borrow().clone()
        };
        self.file.write(&last).await
    }
}
