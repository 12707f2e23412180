//! Progress channel payloads (§6): one message shape for the whole refresh.

use serde::{Deserialize, Serialize};

use super::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressAction {
    Downloading,
    ProcessingGroups,
    Parsing,
    Upserting,
    Pruning,
    ProjectingChannels,
    Rehashing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Success,
    Error,
}

/// `{source_id, action, progress, status?, message?, speed?, elapsed?, eta?,
/// streams_created?, streams_updated?, streams_deleted?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub source_id: SourceId,
    pub action: ProgressAction,
    /// `[0, 100]`.
    pub progress: u8,
    pub status: Option<ProgressStatus>,
    pub message: Option<String>,
    /// Bytes/sec, when known.
    pub speed: Option<f64>,
    pub elapsed_secs: Option<f64>,
    pub eta_secs: Option<f64>,
    pub streams_created: Option<u64>,
    pub streams_updated: Option<u64>,
    pub streams_deleted: Option<u64>,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(source_id: SourceId, action: ProgressAction, progress: u8) -> Self {
        Self {
            source_id,
            action,
            progress: progress.min(100),
            status: None,
            message: None,
            speed: None,
            elapsed_secs: None,
            eta_secs: None,
            streams_created: None,
            streams_updated: None,
            streams_deleted: None,
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: ProgressStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    #[must_use]
    pub fn with_elapsed(mut self, elapsed_secs: f64) -> Self {
        self.elapsed_secs = Some(elapsed_secs);
        self
    }

    #[must_use]
    pub fn with_eta(mut self, eta_secs: f64) -> Self {
        self.eta_secs = Some(eta_secs);
        self
    }

    #[must_use]
    pub fn with_counts(mut self, created: u64, updated: u64, deleted: u64) -> Self {
        self.streams_created = Some(created);
        self.streams_updated = Some(updated);
        self.streams_deleted = Some(deleted);
        self
    }
}
