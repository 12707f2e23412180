//! Stream: a playable source entry, content-addressed by `stream_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{GroupId, SourceId, StreamId};

/// A playable source entry.
///
/// Identity is the surrogate `id`, but uniqueness within the system is
/// enforced on `stream_hash`: two upstream records producing the same hash
/// are considered the same stream and merge on upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: StreamId,
    pub stream_hash: String,
    pub name: String,
    pub url: String,
    pub logo_url: Option<String>,
    pub tvg_id: Option<String>,
    pub source_id: SourceId,
    pub group_id: GroupId,
    /// Original upstream attributes bag, preserved verbatim for unknown keys.
    pub custom_properties: JsonValue,
    pub last_seen: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// The fields compared during upsert change-detection (§4.4): `last_seen`
/// is always stamped; these are the ones that additionally stamp
/// `updated_at` when any of them differ.
pub struct StreamComparableFields<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub logo_url: Option<&'a str>,
    pub tvg_id: Option<&'a str>,
    pub custom_properties: &'a JsonValue,
}

impl Stream {
    #[must_use]
    pub fn differs_from(&self, other: &StreamComparableFields<'_>) -> bool {
        self.name != other.name
            || self.url != other.url
            || self.logo_url.as_deref() != other.logo_url
            || self.tvg_id.as_deref() != other.tvg_id
            || &self.custom_properties != other.custom_properties
    }
}

/// An ordered subset of `{name, url, tvg_id, source_id}` selecting which
/// fields feed `stream_hash`. Different sources may intentionally produce
/// the same hash when `source_id` is excluded, merging duplicate streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashKeyField {
    Name,
    Url,
    TvgId,
    SourceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashKeyList(pub Vec<HashKeyField>);

impl Default for HashKeyList {
    fn default() -> Self {
        Self(vec![HashKeyField::Url, HashKeyField::SourceId])
    }
}
