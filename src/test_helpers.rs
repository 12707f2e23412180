//! Test helpers and fixtures for catalog-core tests
//!
//! Common fixture builders for the pipeline's core entities, to reduce
//! boilerplate and keep tests consistent across the refresh pipeline's
//! modules.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;

use crate::models::{
    Group, GroupId, GroupMembership, ParsedStream, Source, SourceEndpoint, SourceId, SourceKind,
    SourceStatus, Stream, StreamId,
};

/// Generate a random source ID for testing.
#[must_use]
pub fn random_source_id() -> SourceId {
    SourceId::new()
}

/// Generate a random group ID for testing.
#[must_use]
pub fn random_group_id() -> GroupId {
    GroupId::new()
}

/// Test fixture builder for `Source`.
pub struct SourceFixture {
    id: SourceId,
    name: String,
    kind: SourceKind,
    urls: Vec<String>,
    enabled: bool,
    retention_days: u32,
}

impl SourceFixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: random_source_id(),
            name: "Test Source".to_string(),
            kind: SourceKind::Playlist,
            urls: vec!["http://playlist.example/list.m3u".to_string()],
            enabled: true,
            retention_days: 7,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: SourceId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.urls = urls;
        self
    }

    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days;
        self
    }

    #[must_use]
    pub fn build(self) -> Source {
        let now = Utc::now();
        Source {
            id: self.id,
            name: self.name,
            kind: self.kind,
            endpoint: SourceEndpoint { urls: self.urls, local_file_path: None },
            username: None,
            password: None,
            user_agent: None,
            refresh_interval_hours: 6,
            enabled: self.enabled,
            retention_days: self.retention_days,
            status: SourceStatus::Idle,
            last_message: String::new(),
            filters: Vec::new(),
            options: json!({}),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for SourceFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Test fixture builder for `Group`.
pub struct GroupFixture {
    id: GroupId,
    name: String,
}

impl GroupFixture {
    #[must_use]
    pub fn new() -> Self {
        Self { id: random_group_id(), name: "Sports".to_string() }
    }

    #[must_use]
    pub fn with_id(mut self, id: GroupId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> Group {
        Group { id: self.id, name: self.name, created_at: Utc::now() }
    }
}

impl Default for GroupFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Test fixture builder for `GroupMembership`.
pub struct MembershipFixture {
    source_id: SourceId,
    group_id: GroupId,
    group_name: String,
    enabled: bool,
    custom_properties: serde_json::Value,
}

impl MembershipFixture {
    #[must_use]
    pub fn new(source_id: SourceId, group_id: GroupId, group_name: &str) -> Self {
        Self {
            source_id,
            group_id,
            group_name: group_name.to_string(),
            enabled: true,
            custom_properties: json!({}),
        }
    }

    #[must_use]
    pub fn with_auto_channel_sync(mut self, enabled: bool) -> Self {
        self.custom_properties["auto_channel_sync"] = json!(enabled);
        self
    }

    #[must_use]
    pub fn with_custom_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.custom_properties[key] = value;
        self
    }

    #[must_use]
    pub fn build(self) -> GroupMembership {
        let now = Utc::now();
        GroupMembership {
            source_id: self.source_id,
            group_id: self.group_id,
            group_name: self.group_name,
            enabled: self.enabled,
            custom_properties: self.custom_properties,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Build a bare `ParsedStream` with the given name/url and an optional
/// `group-title` attribute, mirroring what the playlist parser produces.
#[must_use]
pub fn sample_parsed_stream(name: &str, url: &str, group_title: &str) -> ParsedStream {
    let mut attrs = HashMap::new();
    attrs.insert("group-title".to_string(), group_title.to_string());
    ParsedStream { name: name.to_string(), url: url.to_string(), attrs }
}

/// Test fixture builder for a persisted `Stream` row.
pub struct StreamFixture {
    id: StreamId,
    stream_hash: String,
    name: String,
    url: String,
    source_id: SourceId,
    group_id: GroupId,
}

impl StreamFixture {
    #[must_use]
    pub fn new(source_id: SourceId, group_id: GroupId) -> Self {
        Self {
            id: StreamId::new(),
            stream_hash: format!("hash-{}", crate::models::generate_id()),
            name: "Test Channel".to_string(),
            url: "http://stream.example/live/1.ts".to_string(),
            source_id,
            group_id,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    #[must_use]
    pub fn with_hash(mut self, hash: &str) -> Self {
        self.stream_hash = hash.to_string();
        self
    }

    #[must_use]
    pub fn build(self) -> Stream {
        let now = Utc::now();
        Stream {
            id: self.id,
            stream_hash: self.stream_hash,
            name: self.name,
            url: self.url,
            logo_url: None,
            tvg_id: None,
            source_id: self.source_id,
            group_id: self.group_id,
            custom_properties: json!({}),
            last_seen: now,
            updated_at: now,
            created_at: now,
        }
    }
}

/// Async test wrapper with timeout, to keep a hung lock/network call from
/// stalling the suite indefinitely.
pub async fn with_timeout<F>(duration: std::time::Duration, future: F) -> F::Output
where
    F: std::future::Future,
{
    tokio::select! {
        result = future => result,
        () = tokio::time::sleep(duration) => {
            panic!("test timed out after {duration:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_fixture_builds_a_playlist_source_by_default() {
        let source = SourceFixture::new().build();
        assert_eq!(source.kind, SourceKind::Playlist);
        assert!(source.enabled);
        assert_eq!(source.retention_days, 7);
    }

    #[test]
    fn membership_fixture_sets_auto_channel_sync_flag() {
        let source_id = random_source_id();
        let group_id = random_group_id();
        let membership = MembershipFixture::new(source_id, group_id, "Sports")
            .with_auto_channel_sync(true)
            .build();
        assert!(membership.auto_channel_sync());
    }

    #[test]
    fn stream_fixture_builds_with_given_source_and_group() {
        let source_id = random_source_id();
        let group_id = random_group_id();
        let stream = StreamFixture::new(source_id.clone(), group_id.clone())
            .with_name("Sport HD")
            .build();
        assert_eq!(stream.name, "Sport HD");
        assert_eq!(stream.source_id, source_id);
        assert_eq!(stream.group_id, group_id);
    }
}
