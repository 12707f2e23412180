//! §4.7 Rehasher: cluster-exclusive recompute of every stream's
//! `stream_hash` under a new hash-key list, merging any duplicates the
//! change produces.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::PgPool;

use crate::models::{GlobalSettings, HashKeyList, Source, SourceId, Stream, StreamId};
use crate::repository::{ChannelRepository, SettingsRepository, SourceRepository, StreamRepository};
use crate::service::distributed_lock::{DistributedLock, LockGuard};
use crate::service::progress_reporter::ProgressReporter;
use crate::{Error, Result};

const REHASH_OPERATION: &str = "rehash_streams";
const REHASH_RESOURCE: &str = "global";

#[derive(Debug, Default, Clone, Copy)]
pub struct RehashSummary {
    pub total_processed: u64,
    pub duplicates_merged: u64,
    pub final_count: u64,
}

pub struct Rehasher {
    pool: PgPool,
    streams: StreamRepository,
    channels: ChannelRepository,
    sources: SourceRepository,
    settings: SettingsRepository,
    lock: DistributedLock,
}

impl Rehasher {
    #[must_use]
    pub fn new(
        pool: PgPool,
        streams: StreamRepository,
        channels: ChannelRepository,
        sources: SourceRepository,
        settings: SettingsRepository,
        lock: DistributedLock,
    ) -> Self {
        Self { pool, streams, channels, sources, settings, lock }
    }

    /// Run a full rehash to a new key list. Acquires the per-source refresh
    /// lock for every currently active source before touching any row; if
    /// any acquisition fails, every lock already held is released (via each
    /// `LockGuard`'s `Drop`) and the operation aborts with a "blocked" error.
    pub async fn rehash(
        &self,
        new_key_list: HashKeyList,
        rehash_lock_ttl_seconds: u64,
        refresh_lock_ttl_seconds: u64,
        progress: &ProgressReporter,
        progress_source_id: &SourceId,
    ) -> Result<RehashSummary> {
        let rehash_key = format!("{REHASH_OPERATION}:{REHASH_RESOURCE}");
        let Some(rehash_lock_value) = self.lock.acquire(&rehash_key, rehash_lock_ttl_seconds).await? else {
            return Err(Error::LockContended("rehash already in progress".to_string()));
        };
        let _rehash_guard = LockGuard::from_acquired(self.lock.clone(), rehash_key, rehash_lock_value);

        let active_sources = self.sources.list_enabled().await?;
        let source_guards = match self.acquire_all_source_locks(&active_sources, refresh_lock_ttl_seconds).await {
            Ok(guards) => guards,
            Err(e) => {
                progress
                    .emit_failure(progress_source_id, crate::models::ProgressAction::Rehashing, "blocked")
                    .await;
                return Err(e);
            }
        };

        // source_guards and _rehash_guard release on drop at the end of this
        // scope, after run_rehash either returns or propagates an error.
        let result = self.run_rehash(&new_key_list, progress, progress_source_id).await;
        drop(source_guards);
        result
    }

    async fn acquire_all_source_locks(&self, sources: &[Source], ttl_seconds: u64) -> Result<Vec<LockGuard>> {
        let mut acquired: Vec<LockGuard> = Vec::new();
        for source in sources {
            let key = format!("refresh_single_source:{}", source.id);
            match self.lock.acquire(&key, ttl_seconds).await? {
                Some(value) => acquired.push(LockGuard::from_acquired(self.lock.clone(), key, value)),
                None => {
                    return Err(Error::LockContended(format!(
                        "could not acquire refresh lock for source {}",
                        source.id
                    )));
                }
            }
        }
        Ok(acquired)
    }

    async fn run_rehash(
        &self,
        new_key_list: &HashKeyList,
        progress: &ProgressReporter,
        progress_source_id: &SourceId,
    ) -> Result<RehashSummary> {
        const BATCH_SIZE: i64 = 1500;

        let mut summary = RehashSummary::default();
        let mut after_id: Option<StreamId> = None;
        let mut seen_hashes: HashMap<String, StreamId> = HashMap::new();

        loop {
            let batch = self.streams.list_all_ordered(after_id.as_ref(), BATCH_SIZE).await?;
            if batch.is_empty() {
                break;
            }
            after_id = batch.last().map(|s| s.id.clone());

            for stream in &batch {
                summary.total_processed += 1;
                let new_hash = crate::service::hashing::stream_hash(
                    &to_parsed(stream),
                    &stream.source_id,
                    new_key_list,
                );

                let survivor_id = seen_hashes.get(&new_hash).cloned();
                let collision = match &survivor_id {
                    Some(id) => Some(id.clone()),
                    None => self
                        .streams
                        .find_by_hash(&new_hash)
                        .await?
                        .filter(|existing| existing.id != stream.id)
                        .map(|existing| existing.id),
                };

                match collision {
                    None => {
                        let mut tx = self.pool.begin().await?;
                        self.streams.update_hash_with_executor(&mut *tx, &stream.id, &new_hash).await?;
                        tx.commit().await?;
                        seen_hashes.insert(new_hash, stream.id.clone());
                    }
                    Some(survivor_id) => {
                        self.merge_into_survivor(stream, &survivor_id).await?;
                        summary.duplicates_merged += 1;
                        seen_hashes.insert(new_hash, survivor_id);
                    }
                }
            }

            let pct = 0u8;
            progress
                .emit(
                    crate::models::ProgressEvent::new(
                        progress_source_id.clone(),
                        crate::models::ProgressAction::Rehashing,
                        pct,
                    )
                    .with_status(crate::models::ProgressStatus::Running)
                    .with_counts(0, summary.duplicates_merged, 0),
                )
                .await;
        }

        summary.final_count = summary.total_processed - summary.duplicates_merged;

        progress
            .emit(
                crate::models::ProgressEvent::new(
                    progress_source_id.clone(),
                    crate::models::ProgressAction::Rehashing,
                    100,
                )
                .with_status(crate::models::ProgressStatus::Success)
                .with_counts(0, summary.duplicates_merged, 0),
            )
            .await;

        let mut tx = self.pool.begin().await?;
        self.settings
            .set_hash_key_list_with_executor(
                &mut *tx,
                &GlobalSettings { hash_key_list: new_key_list.clone() },
            )
            .await?;
        tx.commit().await?;

        Ok(summary)
    }

    /// Merge a duplicate `stream` into `survivor_id`: repoint or drop
    /// `ChannelStream` edges, copy mutable fields across if the duplicate is
    /// newer, then delete the duplicate.
    async fn merge_into_survivor(&self, stream: &Stream, survivor_id: &StreamId) -> Result<()> {
        let survivor = self
            .streams
            .find_by_id(survivor_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("rehash survivor {survivor_id} vanished mid-merge")))?;
        self.apply_merge(stream, &survivor).await
    }

    async fn apply_merge(&self, stream: &Stream, survivor: &Stream) -> Result<()> {
        let edges = self.channels.list_channel_streams_for_stream(&stream.id).await?;
        let mut tx = self.pool.begin().await?;

        for edge in &edges {
            let exists_for_survivor = self
                .channels
                .channel_stream_edge_exists_with_executor(&mut *tx, &edge.channel_id, &survivor.id)
                .await?;
            if exists_for_survivor {
                self.channels
                    .delete_channel_stream_edge_with_executor(&mut *tx, &edge.channel_id, &stream.id)
                    .await?;
            } else {
                self.channels
                    .repoint_channel_stream_with_executor(&mut *tx, &edge.channel_id, &stream.id, &survivor.id)
                    .await?;
            }
        }

        if stream.updated_at > survivor.updated_at {
            let mut merged = survivor.clone();
            merged.name = stream.name.clone();
            merged.url = stream.url.clone();
            merged.logo_url = stream.logo_url.clone();
            merged.tvg_id = stream.tvg_id.clone();
            merged.custom_properties = stream.custom_properties.clone();
            merged.updated_at = Utc::now();
            self.streams.update_with_executor(&mut *tx, &merged).await?;
        }

        self.streams.delete_batch_with_executor(&mut *tx, &[stream.id.clone()]).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn to_parsed(stream: &Stream) -> crate::models::ParsedStream {
    let mut attrs = std::collections::HashMap::new();
    if let Some(tvg_id) = &stream.tvg_id {
        attrs.insert("tvg-id".to_string(), tvg_id.clone());
    }
    crate::models::ParsedStream { name: stream.name.clone(), url: stream.url.clone(), attrs }
}

