//! §5 Refresh Orchestrator: the top-level state machine that drives one
//! source through `fetch -> parse -> reconcile_groups -> upsert -> prune ->
//! project_channels -> finalize`, owning the source's exclusive refresh
//! lock and its status transitions.

use chrono::Utc;
use sqlx::PgPool;

use crate::config::{FetchConfig, TaskLockConfig};
use crate::models::{DomainEvent, ParseOutput, Source, SourceKind, SourceStatus};
use crate::repository::{GroupRepository, SettingsRepository, SourceRepository};
use crate::service::auto_channel_projector::AutoChannelProjector;
use crate::service::catalog_client::CatalogClient;
use crate::service::distributed_lock::{DistributedLock, LockGuard};
use crate::service::event_bus::EventBus;
use crate::service::fetcher::Fetcher;
use crate::service::group_reconciler::GroupReconciler;
use crate::service::progress_reporter::ProgressReporter;
use crate::service::stale_pruner::StalePruner;
use crate::service::stream_upserter::StreamUpserter;
use crate::{Error, Result};

/// Tally carried through to the terminal `m3u.refresh_completed` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct RefreshOutcome {
    pub streams_created: u64,
    pub streams_updated: u64,
    pub streams_deleted: u64,
}

pub struct RefreshOrchestrator {
    sources: SourceRepository,
    groups: GroupRepository,
    settings: SettingsRepository,
    lock: DistributedLock,
    fetcher: Fetcher,
    reconciler: GroupReconciler,
    upserter: StreamUpserter,
    pruner: StalePruner,
    projector: AutoChannelProjector,
    events: EventBus,
    progress: ProgressReporter,
    fetch_config: FetchConfig,
    task_lock_config: TaskLockConfig,
}

impl RefreshOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        sources: SourceRepository,
        groups: GroupRepository,
        settings: SettingsRepository,
        lock: DistributedLock,
        fetcher: Fetcher,
        upserter: StreamUpserter,
        pruner: StalePruner,
        projector: AutoChannelProjector,
        events: EventBus,
        progress: ProgressReporter,
        fetch_config: FetchConfig,
        task_lock_config: TaskLockConfig,
    ) -> Self {
        let reconciler = GroupReconciler::new(pool.clone(), GroupRepository::new(pool), events.clone());
        Self {
            sources,
            groups,
            settings,
            lock,
            fetcher,
            reconciler,
            upserter,
            pruner,
            projector,
            events,
            progress,
            fetch_config,
            task_lock_config,
        }
    }

    /// Run one complete refresh cycle for `source_id`. Acquires the
    /// `refresh_single_source:<id>` lock for the whole cycle; if the lock is
    /// already held, returns `Error::LockContended` without touching the
    /// Source's status (§7: lock contention is a normal, silent skip, not a
    /// failure).
    pub async fn refresh_source(&self, source_id: &crate::models::SourceId) -> Result<RefreshOutcome> {
        let lock_key = format!("refresh_single_source:{source_id}");
        let ttl = self.task_lock_config.refresh_single_source_ttl_seconds;

        let Some(lock_value) = self.lock.acquire(&lock_key, ttl).await? else {
            return Err(Error::LockContended(format!(
                "refresh already in progress for source {source_id}"
            )));
        };
        let _guard = LockGuard::from_acquired(self.lock.clone(), lock_key, lock_value);

        self.run_cycle(source_id).await
    }

    async fn run_cycle(&self, source_id: &crate::models::SourceId) -> Result<RefreshOutcome> {
        if !self.sources.try_claim_for_refresh(source_id).await? {
            return Err(Error::LockContended(format!(
                "source {source_id} is already being refreshed"
            )));
        }

        self.events.publish(&DomainEvent::RefreshStarted { source_id: source_id.clone() }).await;

        match self.execute(source_id).await {
            Ok(outcome) => {
                self.sources
                    .update_status(source_id, SourceStatus::Success, "refresh completed")
                    .await?;
                self.progress
                    .emit_success(source_id, crate::models::ProgressAction::ProjectingChannels, "refresh completed")
                    .await;
                self.events
                    .publish(&DomainEvent::RefreshCompleted {
                        source_id: source_id.clone(),
                        streams_created: outcome.streams_created,
                        streams_updated: outcome.streams_updated,
                        streams_deleted: outcome.streams_deleted,
                    })
                    .await;
                Ok(outcome)
            }
            Err(e) => {
                let message = e.to_string();
                self.sources
                    .update_status(source_id, SourceStatus::Error, &message)
                    .await
                    .ok();
                self.progress
                    .emit_failure(source_id, crate::models::ProgressAction::Downloading, message.clone())
                    .await;
                self.events
                    .publish(&DomainEvent::RefreshFailed { source_id: source_id.clone(), message })
                    .await;
                Err(e)
            }
        }
    }

    /// The pipeline proper, once the source is claimed: fetch, parse,
    /// reconcile groups, upsert streams, prune stale rows, project
    /// auto-channels (§5 steps 2-7).
    async fn execute(&self, source_id: &crate::models::SourceId) -> Result<RefreshOutcome> {
        let source = self.sources.get_by_id(source_id).await?;

        let parsed = self.fetch_and_parse(&source).await?;

        self.sources
            .update_status(&source.id, SourceStatus::Parsing, "reconciling groups")
            .await?;
        self.progress
            .emit(
                crate::models::ProgressEvent::new(source.id.clone(), crate::models::ProgressAction::ProcessingGroups, 0)
                    .with_status(crate::models::ProgressStatus::Running),
            )
            .await;

        // scan_start is captured once parsing has produced a result, so the
        // stale pruner's cutoff reflects "not seen by this cycle's upsert",
        // not the wall-clock time the HTTP request happened to finish at.
        let scan_start = Utc::now();

        let enabled_groups = self.reconciler.reconcile(&source, &parsed.groups).await?;

        let hash_key_list = self.settings.get().await?.hash_key_list;

        self.sources
            .update_status(&source.id, SourceStatus::Parsing, "upserting streams")
            .await?;
        let upsert_counts = self
            .upserter
            .upsert(&source, &parsed.streams, &enabled_groups, &hash_key_list, &self.progress)
            .await?;

        let enabled_group_ids: Vec<crate::models::GroupId> = enabled_groups.values().cloned().collect();
        self.progress
            .emit(
                crate::models::ProgressEvent::new(source.id.clone(), crate::models::ProgressAction::Pruning, 0)
                    .with_status(crate::models::ProgressStatus::Running),
            )
            .await;
        let prune_counts = self.pruner.prune(&source, scan_start, &enabled_group_ids).await?;

        self.progress
            .emit(
                crate::models::ProgressEvent::new(source.id.clone(), crate::models::ProgressAction::ProjectingChannels, 0)
                    .with_status(crate::models::ProgressStatus::Running),
            )
            .await;
        let memberships = self.groups.list_memberships_for_source(&source.id).await?;
        self.projector.project_source(&source, &memberships, scan_start).await?;

        Ok(RefreshOutcome {
            streams_created: upsert_counts.created,
            streams_updated: upsert_counts.updated,
            streams_deleted: prune_counts.total(),
        })
    }

    /// Dispatches on `SourceKind`: a playlist source downloads raw text and
    /// hands it to the line-oriented parser; a catalog source drives the
    /// authenticate/categories/streams session via `CatalogClient` (§4.1,
    /// §4.2).
    async fn fetch_and_parse(&self, source: &Source) -> Result<ParseOutput> {
        self.sources
            .update_status(&source.id, SourceStatus::Fetching, "downloading")
            .await?;

        match source.kind {
            SourceKind::Playlist => match self.fetcher.fetch_playlist(source, &self.progress, false).await {
                Ok(text) => {
                    self.sources
                        .update_status(&source.id, SourceStatus::Parsing, "parsing playlist")
                        .await?;
                    self.fetcher.parse_and_cache_playlist(source.id.as_str(), &text).await
                }
                Err(e) => {
                    if let Some(cached) = self.fetcher.load_cached_parse(source.id.as_str()).await? {
                        tracing::warn!(
                            source_id = %source.id,
                            error = %e,
                            "live fetch exhausted, serving last cached parse"
                        );
                        Ok(cached)
                    } else {
                        Err(e)
                    }
                }
            },
            SourceKind::Catalog => {
                let base_url = source.endpoint.urls.first().cloned().ok_or_else(|| {
                    Error::MissingRefreshInputs(format!("catalog source {} has no base URL", source.id))
                })?;
                let username = source.username.clone().unwrap_or_default();
                let password = source.password.clone().unwrap_or_default();
                let client = CatalogClient::new(base_url, username, password, source.effective_user_agent())?;
                client.authenticate().await?;
                self.sources
                    .update_status(&source.id, SourceStatus::Parsing, "parsing catalog")
                    .await?;
                self.fetcher.fetch_catalog(source, &client).await
            }
        }
    }

    #[must_use]
    pub const fn fetch_config(&self) -> &FetchConfig {
        &self.fetch_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_defaults_to_zero() {
        let outcome = RefreshOutcome::default();
        assert_eq!(outcome.streams_created, 0);
        assert_eq!(outcome.streams_updated, 0);
        assert_eq!(outcome.streams_deleted, 0);
    }
}
