//! Group and `GroupMembership`: a named bucket shared across sources, and
//! the per-source annotated inclusion of it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::{GroupId, SourceId};

/// A named bucket for categorizing streams (e.g. "Sports HD").
///
/// Created lazily the first time it is observed in any source's parsed
/// output; deleted when its last membership vanishes and it has no direct
/// channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Well-known user-facing keys read out of `GroupMembership::custom_properties`.
/// Everything else in the bag passes through untouched.
pub mod custom_property_keys {
    pub const XC_ID: &str = "xc_id";
    pub const AUTO_CHANNEL_SYNC: &str = "auto_channel_sync";
    pub const AUTO_SYNC_CHANNEL_START: &str = "auto_sync_channel_start";
    pub const FORCE_DUMMY_EPG: &str = "force_dummy_epg";
    pub const GROUP_OVERRIDE: &str = "group_override";
    pub const NAME_REGEX_PATTERN: &str = "name_regex_pattern";
    pub const NAME_REPLACE_PATTERN: &str = "name_replace_pattern";
    pub const NAME_MATCH_REGEX: &str = "name_match_regex";
    pub const CHANNEL_PROFILE_IDS: &str = "channel_profile_ids";
    pub const CHANNEL_SORT_ORDER: &str = "channel_sort_order";
    pub const CHANNEL_SORT_REVERSE: &str = "channel_sort_reverse";
    pub const STREAM_PROFILE_ID: &str = "stream_profile_id";

    /// Keys the refresh pipeline itself writes; every other key in the bag
    /// is a user annotation that must survive a refresh byte-identical.
    pub const UPSTREAM_PROVIDED: &[&str] = &[XC_ID];
}

/// The (Source x Group) join carrying per-source annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMembership {
    pub source_id: SourceId,
    pub group_id: GroupId,
    pub group_name: String,
    pub enabled: bool,
    pub custom_properties: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupMembership {
    #[must_use]
    pub fn auto_channel_sync(&self) -> bool {
        self.custom_properties
            .get(custom_property_keys::AUTO_CHANNEL_SYNC)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn xc_id(&self) -> Option<&str> {
        self.custom_properties
            .get(custom_property_keys::XC_ID)
            .and_then(serde_json::Value::as_str)
    }

    /// Merge rule used on every refresh: copy `existing`, overwrite only the
    /// upstream-provided keys with `parsed`'s values, preserve every other
    /// (user) key untouched. New keys present only in `parsed` win.
    #[must_use]
    pub fn merge_custom_properties(existing: &JsonValue, parsed: &JsonValue) -> JsonValue {
        let mut merged = existing.clone();
        let Some(merged_map) = merged.as_object_mut() else {
            return parsed.clone();
        };
        if let Some(parsed_map) = parsed.as_object() {
            for key in custom_property_keys::UPSTREAM_PROVIDED {
                if let Some(value) = parsed_map.get(*key) {
                    merged_map.insert((*key).to_string(), value.clone());
                } else {
                    merged_map.remove(*key);
                }
            }
            // Keys present in the cached-but-stale membership's parsed view
            // that the surviving record never had: new keys win.
            for (key, value) in parsed_map {
                if !merged_map.contains_key(key) {
                    merged_map.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }
}
