//! §4.2/C3 Progress reporter: publishes `ProgressEvent`s on a per-source
//! Redis pub/sub channel, and mirrors the latest status/message onto the
//! Source row so a late-subscribing client can still see the last state.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::cache::KeyBuilder;
use crate::models::id::SourceId;
use crate::models::progress::{ProgressAction, ProgressEvent, ProgressStatus};
use crate::models::SourceStatus;
use crate::repository::SourceRepository;

/// Publishes progress for an in-flight refresh/rehash cycle. Failures to
/// publish are logged, never propagated — progress reporting must not abort
/// the pipeline it is observing.
#[derive(Clone)]
pub struct ProgressReporter {
    redis: ConnectionManager,
    keys: KeyBuilder,
    sources: SourceRepository,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(redis: ConnectionManager, keys: KeyBuilder, sources: SourceRepository) -> Self {
        Self { redis, keys, sources }
    }

    /// Publish an arbitrary progress event and mirror it onto `sources.status`.
    pub async fn emit(&self, event: ProgressEvent) {
        let channel = self.keys.progress_channel(event.source_id.as_str());

        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(source_id = %event.source_id, error = %e, "failed to serialize progress event");
                return;
            }
        };

        let mut conn = self.redis.clone();
        if let Err(e) = conn.publish::<_, _, ()>(&channel, payload).await {
            tracing::warn!(channel, error = %e, "failed to publish progress event");
        }

        let status = match event.status {
            Some(ProgressStatus::Success) => SourceStatus::Success,
            Some(ProgressStatus::Error) => SourceStatus::Error,
            Some(ProgressStatus::Running) | None => running_status_for_action(event.action),
        };
        let message = event.message.clone().unwrap_or_default();
        if let Err(e) = self
            .sources
            .update_status(&event.source_id, status, &message)
            .await
        {
            tracing::warn!(source_id = %event.source_id, error = %e, "failed to mirror progress onto source status");
        }
    }

    /// Convenience for the fetcher's streaming-download progress.
    pub async fn emit_download_progress(
        &self,
        source_id: &SourceId,
        progress: u8,
        speed_bytes_per_sec: f64,
        elapsed_secs: f64,
    ) {
        let event = ProgressEvent::new(source_id.clone(), ProgressAction::Downloading, progress)
            .with_status(ProgressStatus::Running)
            .with_speed(speed_bytes_per_sec)
            .with_elapsed(elapsed_secs);
        self.emit(event).await;
    }

    /// Convenience for reporting a terminal failure for a given action.
    pub async fn emit_failure(&self, source_id: &SourceId, action: ProgressAction, message: impl Into<String>) {
        let event = ProgressEvent::new(source_id.clone(), action, 100)
            .with_status(ProgressStatus::Error)
            .with_message(message.into());
        self.emit(event).await;
    }

    /// Convenience for reporting a successful terminal step.
    pub async fn emit_success(&self, source_id: &SourceId, action: ProgressAction, message: impl Into<String>) {
        let event = ProgressEvent::new(source_id.clone(), action, 100)
            .with_status(ProgressStatus::Success)
            .with_message(message.into());
        self.emit(event).await;
    }
}

/// Source has no per-action status slots, only a handful of broad states;
/// collapse the finer-grained progress actions onto the closest one so the
/// mirrored status still reads as "doing something" rather than stale Idle.
fn running_status_for_action(action: ProgressAction) -> SourceStatus {
    match action {
        ProgressAction::Downloading => SourceStatus::Fetching,
        ProgressAction::Parsing
        | ProgressAction::ProcessingGroups
        | ProgressAction::Upserting
        | ProgressAction::Pruning
        | ProgressAction::ProjectingChannels
        | ProgressAction::Rehashing => SourceStatus::Parsing,
    }
}
