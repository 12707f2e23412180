//! Channel: a user-facing tunable slot projected from streams.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChannelId, ChannelProfileId, EpgDataId, GroupId, LogoId, SourceId, StreamId, StreamProfileId};

/// A user-facing tunable slot projected from streams.
///
/// `uuid` is preserved across refreshes even when the channel is moved,
/// renamed, or renumbered — it is the stable identity auto-created channels
/// are matched on, never the surrogate `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub uuid: Uuid,
    /// Fractional display number (`1`, `1.5`, ...).
    pub channel_number: f64,
    pub name: String,
    pub tvg_id: Option<String>,
    pub guide_station_id: Option<String>,
    pub logo_id: Option<LogoId>,
    pub epg_data_id: Option<EpgDataId>,
    pub group_id: GroupId,
    pub stream_profile_id: Option<StreamProfileId>,
    pub auto_created: bool,
    pub auto_created_by: Option<SourceId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `ChannelStream(channel, stream, order)`: the ordered membership of a
/// channel's constituent streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStream {
    pub channel_id: ChannelId,
    pub stream_id: StreamId,
    pub order: i32,
}

/// `ChannelProfileMembership(profile, channel, enabled)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProfileMembership {
    pub profile_id: ChannelProfileId,
    pub channel_id: ChannelId,
    pub enabled: bool,
}

/// Sort key for the auto-channel projector's stream ordering (§4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSortOrder {
    /// Insertion order from upstream (stream id).
    Provider,
    /// Natural sort (numeric runs compared as integers), not lexicographic.
    Name,
    TvgId,
    UpdatedAt,
}

impl Default for ChannelSortOrder {
    fn default() -> Self {
        Self::Provider
    }
}
