//! §4.6 Auto-Channel Projector: materializes `auto_created` channels from a
//! group's current streams with stable numbering, rename, profile binding,
//! and orphan deletion.
//!
//! Renumbering and channel upsert run as a single pass sharing one counter,
//! rather than two separate walks each advancing their own — two counters
//! can double-skip numbers under some orderings.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use sqlx::PgPool;

use crate::models::{
    Channel, ChannelId, ChannelProfileId, ChannelProfileMembership, ChannelSortOrder,
    ChannelStream, DomainEvent, GroupId, GroupMembership, Source, Stream, StreamId, StreamProfileId,
};
use crate::repository::{ChannelProfileRepository, ChannelRepository, EpgDataRepository, LogoRepository};
use crate::service::event_bus::EventBus;
use crate::service::natural_sort::natural_sort_by_key;
use crate::Result;

#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectionCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

struct AutoChannelOptions {
    start_number: f64,
    force_dummy_epg: bool,
    group_override: Option<GroupId>,
    rename: Option<(Regex, String)>,
    name_match: Option<Regex>,
    channel_profile_ids: Vec<ChannelProfileId>,
    sort_order: ChannelSortOrder,
    sort_reverse: bool,
    stream_profile_id: Option<StreamProfileId>,
}

impl AutoChannelOptions {
    fn from_membership(membership: &GroupMembership) -> Self {
        let props = &membership.custom_properties;
        let as_str = |key: &str| props.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let as_bool = |key: &str| props.get(key).and_then(|v| v.as_bool()).unwrap_or(false);

        let start_number = props
            .get("auto_sync_channel_start")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(1.0);

        let group_override = as_str("group_override").map(GroupId::from);

        let rename = match (as_str("name_regex_pattern"), as_str("name_replace_pattern")) {
            (Some(pattern), Some(replace)) if !pattern.is_empty() => {
                Regex::new(&pattern).ok().map(|re| (re, canonicalize_backreferences(&replace)))
            }
            _ => None,
        };

        let name_match = as_str("name_match_regex").and_then(|p| Regex::new(&p).ok());

        let channel_profile_ids = props
            .get("channel_profile_ids")
            .and_then(serde_json::Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(ChannelProfileId::from)
                    .collect()
            })
            .unwrap_or_default();

        let sort_order = match as_str("channel_sort_order").as_deref() {
            Some("name") => ChannelSortOrder::Name,
            Some("tvg_id") => ChannelSortOrder::TvgId,
            Some("updated_at") => ChannelSortOrder::UpdatedAt,
            _ => ChannelSortOrder::Provider,
        };

        Self {
            start_number,
            force_dummy_epg: as_bool("force_dummy_epg"),
            group_override,
            rename,
            name_match,
            channel_profile_ids,
            sort_order,
            sort_reverse: as_bool("channel_sort_reverse"),
            stream_profile_id: as_str("stream_profile_id").map(StreamProfileId::from),
        }
    }

    fn apply_rename(&self, name: &str) -> String {
        match &self.rename {
            Some((re, replace)) => re.replace(name, replace.as_str()).into_owned(),
            None => name.to_string(),
        }
    }
}

/// `\1`-style backrefs are accepted alongside `$1`; the `regex` crate's
/// `Replacer` only understands `$N`/`${N}`, so every `\N` is rewritten to
/// `$N` before use.
fn canonicalize_backreferences(replace: &str) -> String {
    let mut out = String::with_capacity(replace.len());
    let mut chars = replace.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_digit() {
                    out.push('$');
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

pub struct AutoChannelProjector {
    pool: PgPool,
    channels: ChannelRepository,
    channel_profiles: ChannelProfileRepository,
    logos: LogoRepository,
    epg_data: EpgDataRepository,
    streams: crate::repository::StreamRepository,
    events: EventBus,
}

impl AutoChannelProjector {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        channels: ChannelRepository,
        channel_profiles: ChannelProfileRepository,
        logos: LogoRepository,
        epg_data: EpgDataRepository,
        streams: crate::repository::StreamRepository,
        events: EventBus,
    ) -> Self {
        Self { pool, channels, channel_profiles, logos, epg_data, streams, events }
    }

    /// Project every auto-sync-enabled, enabled `GroupMembership` for a
    /// Source, then sweep orphaned auto-channels across all of them.
    pub async fn project_source(
        &self,
        source: &Source,
        memberships: &[GroupMembership],
        scan_start: DateTime<Utc>,
    ) -> Result<ProjectionCounts> {
        let mut totals = ProjectionCounts::default();
        for membership in memberships {
            if !membership.enabled || !membership.auto_channel_sync() {
                continue;
            }
            let counts = self.project_group(source, membership, scan_start).await?;
            totals.created += counts.created;
            totals.updated += counts.updated;
            totals.deleted += counts.deleted;
        }
        self.sweep_orphans(source).await?;
        Ok(totals)
    }

    async fn project_group(
        &self,
        source: &Source,
        membership: &GroupMembership,
        scan_start: DateTime<Utc>,
    ) -> Result<ProjectionCounts> {
        let options = AutoChannelOptions::from_membership(membership);
        let target_group_id = options.group_override.clone().unwrap_or_else(|| membership.group_id.clone());

        let mut streams = self
            .streams
            .list_for_source_group_since(&source.id, &membership.group_id, scan_start)
            .await?;
        if let Some(name_match) = &options.name_match {
            streams.retain(|s| name_match.is_match(&s.name));
        }
        sort_streams(&mut streams, options.sort_order, options.sort_reverse);

        let mut existing_by_stream: HashMap<StreamId, Channel> = self
            .channels
            .map_streams_to_auto_created_channels(&source.id, &membership.group_id)
            .await?
            .into_iter()
            .collect();

        let blocked: HashSet<u64> = self
            .channels
            .blocked_numbers_in_group(&target_group_id, &source.id)
            .await?
            .into_iter()
            .map(number_key)
            .collect();

        let desired_profiles = self.resolve_desired_profiles(&options.channel_profile_ids).await?;

        let mut counts = ProjectionCounts::default();
        let mut counter = options.start_number;
        let now = Utc::now();

        for stream in &streams {
            while blocked.contains(&number_key(counter)) {
                counter += 1.0;
            }
            let number = counter;
            counter += 1.0;

            let name = options.apply_rename(&stream.name);
            let logo_id = match &stream.logo_url {
                Some(url) if !url.is_empty() => Some(self.logos.get_or_create_by_url(url).await?.id),
                _ => None,
            };
            let epg_data_id = if options.force_dummy_epg {
                None
            } else {
                match &stream.tvg_id {
                    Some(tvg_id) => self.epg_data.find_first_by_tvg_id(tvg_id).await?.map(|e| e.id),
                    None => None,
                }
            };

            if let Some(mut channel) = existing_by_stream.remove(&stream.id) {
                let changed = (channel.channel_number - number).abs() > f64::EPSILON
                    || channel.name != name
                    || channel.tvg_id != stream.tvg_id
                    || channel.logo_id != logo_id
                    || channel.epg_data_id != epg_data_id
                    || channel.group_id != target_group_id
                    || channel.stream_profile_id != options.stream_profile_id;

                channel.channel_number = number;
                channel.name = name;
                channel.tvg_id = stream.tvg_id.clone();
                channel.guide_station_id = stream.tvg_id.clone();
                channel.logo_id = logo_id;
                channel.epg_data_id = epg_data_id;
                channel.group_id = target_group_id.clone();
                channel.stream_profile_id = options.stream_profile_id.clone();
                channel.updated_at = now;

                let mut tx = self.pool.begin().await?;
                self.channels.update_with_executor(&mut *tx, &channel).await?;
                self.sync_profile_memberships(&mut tx, &channel.id, &desired_profiles).await?;
                tx.commit().await?;

                if changed {
                    self.events.publish(&DomainEvent::ChannelUpdated { channel_id: channel.id.clone() }).await;
                    counts.updated += 1;
                }
            } else {
                let channel = Channel {
                    id: ChannelId::new(),
                    uuid: uuid::Uuid::new_v4(),
                    channel_number: number,
                    name,
                    tvg_id: stream.tvg_id.clone(),
                    guide_station_id: stream.tvg_id.clone(),
                    logo_id,
                    epg_data_id,
                    group_id: target_group_id.clone(),
                    stream_profile_id: options.stream_profile_id.clone(),
                    auto_created: true,
                    auto_created_by: Some(source.id.clone()),
                    created_at: now,
                    updated_at: now,
                };

                let mut tx = self.pool.begin().await?;
                self.channels.insert_with_executor(&mut *tx, &channel).await?;
                self.channels
                    .insert_channel_stream_with_executor(
                        &mut *tx,
                        &ChannelStream { channel_id: channel.id.clone(), stream_id: stream.id.clone(), order: 0 },
                    )
                    .await?;
                self.sync_profile_memberships(&mut tx, &channel.id, &desired_profiles).await?;
                tx.commit().await?;

                self.events.publish(&DomainEvent::ChannelCreated { channel_id: channel.id.clone() }).await;
                self.events
                    .publish(&DomainEvent::ChannelStreamAdded {
                        channel_id: channel.id.clone(),
                        stream_id: stream.id.clone(),
                    })
                    .await;
                counts.created += 1;
            }
        }

        for (stream_id, orphan) in existing_by_stream {
            let mut tx = self.pool.begin().await?;
            self.channels.delete_with_executor(&mut *tx, &orphan.id).await?;
            tx.commit().await?;
            self.events
                .publish(&DomainEvent::ChannelStreamRemoved { channel_id: orphan.id.clone(), stream_id })
                .await;
            self.events.publish(&DomainEvent::ChannelDeleted { channel_id: orphan.id.clone() }).await;
            counts.deleted += 1;
        }

        Ok(counts)
    }

    async fn resolve_desired_profiles(&self, configured: &[ChannelProfileId]) -> Result<Vec<ChannelProfileId>> {
        if !configured.is_empty() {
            return Ok(configured.to_vec());
        }
        Ok(self.channel_profiles.list_all().await?.into_iter().map(|p| p.id).collect())
    }

    async fn sync_profile_memberships(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        channel_id: &ChannelId,
        desired: &[ChannelProfileId],
    ) -> Result<()> {
        let current = self.channels.list_profile_ids_for_channel(channel_id).await?;
        let desired_set: HashSet<&ChannelProfileId> = desired.iter().collect();
        let current_set: HashSet<&ChannelProfileId> = current.iter().collect();
        if desired_set == current_set {
            return Ok(());
        }
        for profile_id in &current {
            self.channels
                .set_profile_membership_with_executor(
                    &mut **tx,
                    &ChannelProfileMembership { profile_id: profile_id.clone(), channel_id: channel_id.clone(), enabled: false },
                )
                .await?;
        }
        for profile_id in desired {
            self.channels
                .set_profile_membership_with_executor(
                    &mut **tx,
                    &ChannelProfileMembership { profile_id: profile_id.clone(), channel_id: channel_id.clone(), enabled: true },
                )
                .await?;
        }
        Ok(())
    }

    /// Post-pass (§4.6 "Orphan sweep"): delete auto-created channels whose
    /// stream no longer belongs to this Source at all — covers streams the
    /// stale pruner removed outright, which `project_group`'s per-group
    /// pass above cannot see once the stream row is gone.
    async fn sweep_orphans(&self, source: &Source) -> Result<()> {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT c.id FROM channels c \
             WHERE c.auto_created = true AND c.auto_created_by = $1 \
               AND NOT EXISTS ( \
                 SELECT 1 FROM channel_streams cs \
                 JOIN streams s ON s.id = cs.stream_id \
                 WHERE cs.channel_id = c.id AND s.source_id = $1 \
               )",
        )
        .bind(source.id.as_str())
        .fetch_all(&self.pool)
        .await?;

        for (id,) in rows {
            let channel_id = ChannelId::from(id);
            let mut tx = self.pool.begin().await?;
            self.channels.delete_with_executor(&mut *tx, &channel_id).await?;
            tx.commit().await?;
            self.events.publish(&DomainEvent::ChannelDeleted { channel_id }).await;
        }
        Ok(())
    }
}

/// Channel numbers are `f64`; comparing/hashing them directly for the
/// blocked-number set would be fragile, so bucket to an integer key at
/// millicent precision (numbers in practice are whole or `.5`-stepped).
fn number_key(n: f64) -> u64 {
    (n * 1000.0).round() as u64
}

fn sort_streams(streams: &mut [Stream], order: ChannelSortOrder, reverse: bool) {
    match order {
        ChannelSortOrder::Provider => streams.sort_by(|a, b| a.id.cmp(&b.id)),
        ChannelSortOrder::Name => natural_sort_by_key(streams, |s| s.name.as_str()),
        ChannelSortOrder::TvgId => {
            streams.sort_by(|a, b| a.tvg_id.as_deref().unwrap_or("").cmp(b.tvg_id.as_deref().unwrap_or("")));
        }
        ChannelSortOrder::UpdatedAt => streams.sort_by_key(|s| s.updated_at),
    }
    if reverse {
        streams.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_backslash_backrefs_to_dollar() {
        assert_eq!(canonicalize_backreferences(r"prefix \1 suffix"), "prefix $1 suffix");
    }

    #[test]
    fn leaves_dollar_backrefs_untouched() {
        assert_eq!(canonicalize_backreferences("prefix $1 suffix"), "prefix $1 suffix");
    }

    #[test]
    fn number_key_treats_near_equal_floats_as_equal() {
        assert_eq!(number_key(100.0), number_key(100.0000001));
    }

    #[test]
    fn sort_streams_by_name_is_natural_not_lexicographic() {
        let mut streams = vec![sample_stream("Ch 10"), sample_stream("Ch 2")];
        sort_streams(&mut streams, ChannelSortOrder::Name, false);
        assert_eq!(streams[0].name, "Ch 2");
        assert_eq!(streams[1].name, "Ch 10");
    }

    fn sample_stream(name: &str) -> Stream {
        Stream {
            id: StreamId::new(),
            stream_hash: "h".to_string(),
            name: name.to_string(),
            url: "http://x".to_string(),
            logo_url: None,
            tvg_id: None,
            source_id: crate::models::SourceId::new(),
            group_id: GroupId::new(),
            custom_properties: serde_json::json!({}),
            last_seen: Utc::now(),
            updated_at: Utc::now(),
            created_at: Utc::now(),
        }
    }
}
