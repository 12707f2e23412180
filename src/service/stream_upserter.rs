//! §4.4 Stream Upserter: hashes, filters, batches, and persists parsed
//! streams with a bounded worker pool.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use sqlx::PgPool;

use crate::config::UpsertConfig;
use crate::models::{DomainEvent, HashKeyList, ParsedStream, Source, SourceKind, Stream, StreamId};
use crate::repository::{compile_filters, passes_filters, StreamRepository};
use crate::service::event_bus::EventBus;
use crate::service::hashing::stream_hash;
use crate::service::progress_reporter::ProgressReporter;
use crate::Result;

use super::group_reconciler::EnabledGroupIds;

/// Per-source tally returned to the orchestrator for the terminal progress
/// event and the `m3u.refresh_completed` payload.
#[derive(Debug, Default, Clone, Copy)]
pub struct UpsertCounts {
    pub created: u64,
    pub updated: u64,
}

pub struct StreamUpserter {
    pool: PgPool,
    streams: StreamRepository,
    config: UpsertConfig,
    events: EventBus,
}

impl StreamUpserter {
    #[must_use]
    pub fn new(pool: PgPool, streams: StreamRepository, config: UpsertConfig, events: EventBus) -> Self {
        Self { pool, streams, config, events }
    }

    /// Upsert every parsed stream whose group is currently enabled, after
    /// applying the source's filter chain (playlist dialect only).
    pub async fn upsert(
        &self,
        source: &Source,
        parsed_streams: &[ParsedStream],
        enabled_groups: &EnabledGroupIds,
        hash_key_list: &HashKeyList,
        progress: &ProgressReporter,
    ) -> Result<UpsertCounts> {
        let eligible = self.filter_eligible(source, parsed_streams, enabled_groups)?;

        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<Vec<ParsedStream>> = eligible
            .chunks(batch_size)
            .map(<[ParsedStream]>::to_vec)
            .collect();
        let total_batches = batches.len().max(1);

        let workers = match source.kind {
            SourceKind::Playlist => self.config.playlist_workers,
            SourceKind::Catalog => self.config.catalog_workers,
        }
        .max(1);

        let started = Instant::now();
        let mut done = 0usize;
        let mut totals = UpsertCounts::default();

        let mut pending = batches.into_iter();
        let mut in_flight = FuturesUnordered::new();
        for _ in 0..workers {
            if let Some(batch) = pending.next() {
                in_flight.push(self.process_batch(source, batch, enabled_groups, hash_key_list));
            }
        }

        while let Some(result) = in_flight.next().await {
            match result {
                Ok(counts) => {
                    totals.created += counts.created;
                    totals.updated += counts.updated;
                }
                Err(e) => {
                    tracing::error!(source_id = %source.id, error = %e, "upsert batch failed, continuing");
                }
            }
            done += 1;

            let pct = ((done as f64 / total_batches as f64) * 100.0) as u8;
            let elapsed = started.elapsed().as_secs_f64();
            progress
                .emit(
                    crate::models::ProgressEvent::new(
                        source.id.clone(),
                        crate::models::ProgressAction::Upserting,
                        pct,
                    )
                    .with_status(crate::models::ProgressStatus::Running)
                    .with_elapsed(elapsed)
                    .with_counts(totals.created, totals.updated, 0),
                )
                .await;

            if let Some(batch) = pending.next() {
                in_flight.push(self.process_batch(source, batch, enabled_groups, hash_key_list));
            }
        }

        Ok(totals)
    }

    fn filter_eligible(
        &self,
        source: &Source,
        parsed_streams: &[ParsedStream],
        enabled_groups: &EnabledGroupIds,
    ) -> Result<Vec<ParsedStream>> {
        let compiled = match source.kind {
            SourceKind::Playlist => compile_filters(&source.filters)?,
            SourceKind::Catalog => Vec::new(),
        };

        Ok(parsed_streams
            .iter()
            .filter(|s| enabled_groups.contains_key(s.group_title()))
            .filter(|s| {
                if compiled.is_empty() {
                    return true;
                }
                passes_filters(&compiled, &s.name, &s.url, s.group_title())
            })
            .cloned()
            .collect())
    }

    async fn process_batch(
        &self,
        source: &Source,
        batch: Vec<ParsedStream>,
        enabled_groups: &EnabledGroupIds,
        hash_key_list: &HashKeyList,
    ) -> Result<UpsertCounts> {
        let now = Utc::now();

        let mut by_hash: HashMap<String, &ParsedStream> = HashMap::new();
        for parsed in &batch {
            let hash = stream_hash(parsed, &source.id, hash_key_list);
            by_hash.entry(hash).or_insert(parsed);
        }

        let hashes: Vec<String> = by_hash.keys().cloned().collect();
        let existing_by_hash: HashMap<String, Stream> = self
            .streams
            .find_by_hashes(&hashes)
            .await?
            .into_iter()
            .map(|stream| (stream.stream_hash.clone(), stream))
            .collect();

        let mut to_create: Vec<Stream> = Vec::new();
        let mut to_update: Vec<Stream> = Vec::new();
        let mut touch_only: Vec<StreamId> = Vec::new();
        let mut created = 0u64;
        let mut updated = 0u64;

        for (hash, parsed) in &by_hash {
            let group_id = enabled_groups
                .get(parsed.group_title())
                .cloned()
                .expect("eligible streams are pre-filtered to enabled groups");
            let custom_properties = attrs_to_json(&parsed.attrs);

            match existing_by_hash.get(hash) {
                Some(existing) => {
                    let incoming_comparable = crate::models::StreamComparableFields {
                        name: &parsed.name,
                        url: &parsed.url,
                        logo_url: parsed.tvg_logo(),
                        tvg_id: parsed.tvg_id(),
                        custom_properties: &custom_properties,
                    };
                    if existing.differs_from(&incoming_comparable) {
                        let mut updated_stream = existing.clone();
                        updated_stream.name = parsed.name.clone();
                        updated_stream.url = parsed.url.clone();
                        updated_stream.logo_url = parsed.tvg_logo().map(str::to_string);
                        updated_stream.tvg_id = parsed.tvg_id().map(str::to_string);
                        updated_stream.group_id = group_id;
                        updated_stream.custom_properties = custom_properties;
                        updated_stream.last_seen = now;
                        updated_stream.updated_at = now;
                        to_update.push(updated_stream);
                        updated += 1;
                    } else {
                        touch_only.push(existing.id.clone());
                    }
                }
                None => {
                    to_create.push(Stream {
                        id: StreamId::new(),
                        stream_hash: (*hash).clone(),
                        name: parsed.name.clone(),
                        url: parsed.url.clone(),
                        logo_url: parsed.tvg_logo().map(str::to_string),
                        tvg_id: parsed.tvg_id().map(str::to_string),
                        source_id: source.id.clone(),
                        group_id,
                        custom_properties,
                        last_seen: now,
                        updated_at: now,
                        created_at: now,
                    });
                    created += 1;
                }
            }
        }

        let mut tx = self.pool.begin().await?;
        self.streams.create_batch_with_executor(&mut *tx, &to_create).await?;
        for stream in &to_update {
            self.streams.update_with_executor(&mut *tx, stream).await?;
        }
        self.streams
            .touch_last_seen_batch_with_executor(&mut *tx, &touch_only, now)
            .await?;
        tx.commit().await?;

        // Published only after commit, mirroring the group reconciler: a
        // failed publish must never roll back a successful write.
        for stream in &to_create {
            self.events
                .publish(&DomainEvent::StreamCreated { stream_id: stream.id.clone(), source_id: source.id.clone() })
                .await;
        }
        for stream in &to_update {
            self.events
                .publish(&DomainEvent::StreamUpdated { stream_id: stream.id.clone(), source_id: source.id.clone() })
                .await;
        }

        Ok(UpsertCounts { created, updated })
    }
}

fn attrs_to_json(attrs: &HashMap<String, String>) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = attrs
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrs_to_json_preserves_all_keys() {
        let mut attrs = HashMap::new();
        attrs.insert("tvg-logo".to_string(), "L1".to_string());
        attrs.insert("group-title".to_string(), "Sports".to_string());
        let json = attrs_to_json(&attrs);
        assert_eq!(json["tvg-logo"], "L1");
        assert_eq!(json["group-title"], "Sports");
    }
}
