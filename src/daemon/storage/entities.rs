use std::{fmt::Display, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reason an [ActivityEvent] was recorded.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Foreground application or its window changed.
    Change,
    /// Periodic ping while the user stays active in the same window.
    Heartbeat,
    IdleStart,
    IdleEnd,
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Change => write!(f, "change"),
            EventType::Heartbeat => write!(f, "heartbeat"),
            EventType::IdleStart => write!(f, "idle_start"),
            EventType::IdleEnd => write!(f, "idle_end"),
        }
    }
}

/// A single observation written to the event log. Events are never modified after they are
/// created, only appended and eventually pruned.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    /// Display name of the foreground application. This is what timelines are grouped by.
    pub app_name: Arc<str>,
    /// Stable identifier of the application, for example a full path to the executable.
    /// Informational only.
    #[serde(default)]
    pub bundle_id: Option<Arc<str>>,
    #[serde(default)]
    pub window_title: Option<Arc<str>>,
    #[serde(default)]
    pub is_idle: bool,
    pub event_type: EventType,
}

impl ActivityEvent {
    pub fn new(timestamp: DateTime<Utc>, app_name: impl Into<Arc<str>>, event_type: EventType) -> Self {
        Self {
            timestamp,
            app_name: app_name.into(),
            bundle_id: None,
            window_title: None,
            is_idle: false,
            event_type,
        }
    }

    pub fn with_bundle_id(self, bundle_id: impl Into<Arc<str>>) -> Self {
        Self {
            bundle_id: Some(bundle_id.into()),
            ..self
        }
    }

    pub fn with_window_title(self, window_title: impl Into<Arc<str>>) -> Self {
        Self {
            window_title: Some(window_title.into()),
            ..self
        }
    }

    pub fn with_idle(self, is_idle: bool) -> Self {
        Self { is_idle, ..self }
    }
}
