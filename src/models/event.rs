//! Outbound domain events (§6, §9): fire-and-forget notifications the
//! Event Bus Adapter publishes. Modeled as an outbox-shaped enum rather
//! than a signal callback — the save path that produces one of these never
//! blocks on delivery (§9 "Signal-based eventing coupled to entity save").

use serde::{Deserialize, Serialize};

use super::{ChannelId, GroupId, SourceId, StreamId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    #[serde(rename = "m3u.source_created")]
    SourceCreated { source_id: SourceId },
    #[serde(rename = "m3u.source_deleted")]
    SourceDeleted { source_id: SourceId },
    #[serde(rename = "m3u.source_enabled")]
    SourceEnabled { source_id: SourceId },
    #[serde(rename = "m3u.source_disabled")]
    SourceDisabled { source_id: SourceId },
    #[serde(rename = "m3u.refresh_started")]
    RefreshStarted { source_id: SourceId },
    #[serde(rename = "m3u.refresh_completed")]
    RefreshCompleted {
        source_id: SourceId,
        streams_created: u64,
        streams_updated: u64,
        streams_deleted: u64,
    },
    #[serde(rename = "m3u.refresh_failed")]
    RefreshFailed { source_id: SourceId, message: String },

    #[serde(rename = "stream.created")]
    StreamCreated { stream_id: StreamId, source_id: SourceId },
    #[serde(rename = "stream.updated")]
    StreamUpdated { stream_id: StreamId, source_id: SourceId },
    #[serde(rename = "stream.deleted")]
    StreamDeleted { stream_id: StreamId, source_id: SourceId },

    #[serde(rename = "channel.created")]
    ChannelCreated { channel_id: ChannelId },
    #[serde(rename = "channel.updated")]
    ChannelUpdated { channel_id: ChannelId },
    #[serde(rename = "channel.deleted")]
    ChannelDeleted { channel_id: ChannelId },
    #[serde(rename = "channel.stream_added")]
    ChannelStreamAdded { channel_id: ChannelId, stream_id: StreamId },
    #[serde(rename = "channel.stream_removed")]
    ChannelStreamRemoved { channel_id: ChannelId, stream_id: StreamId },

    #[serde(rename = "channel_group.created")]
    GroupCreated { group_id: GroupId },
    #[serde(rename = "channel_group.updated")]
    GroupUpdated { group_id: GroupId },
    #[serde(rename = "channel_group.deleted")]
    GroupDeleted { group_id: GroupId },
}

impl DomainEvent {
    /// The wire event name, matching the dotted names in spec.md §6.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SourceCreated { .. } => "m3u.source_created",
            Self::SourceDeleted { .. } => "m3u.source_deleted",
            Self::SourceEnabled { .. } => "m3u.source_enabled",
            Self::SourceDisabled { .. } => "m3u.source_disabled",
            Self::RefreshStarted { .. } => "m3u.refresh_started",
            Self::RefreshCompleted { .. } => "m3u.refresh_completed",
            Self::RefreshFailed { .. } => "m3u.refresh_failed",
            Self::StreamCreated { .. } => "stream.created",
            Self::StreamUpdated { .. } => "stream.updated",
            Self::StreamDeleted { .. } => "stream.deleted",
            Self::ChannelCreated { .. } => "channel.created",
            Self::ChannelUpdated { .. } => "channel.updated",
            Self::ChannelDeleted { .. } => "channel.deleted",
            Self::ChannelStreamAdded { .. } => "channel.stream_added",
            Self::ChannelStreamRemoved { .. } => "channel.stream_removed",
            Self::GroupCreated { .. } => "channel_group.created",
            Self::GroupUpdated { .. } => "channel_group.updated",
            Self::GroupDeleted { .. } => "channel_group.deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_name_matches_wire_naming() {
        let e = DomainEvent::StreamCreated {
            stream_id: StreamId::from("s1"),
            source_id: SourceId::from("src1"),
        };
        assert_eq!(e.name(), "stream.created");
    }

    #[test]
    fn event_serializes_with_tag() {
        let e = DomainEvent::GroupDeleted { group_id: GroupId::from("g1") };
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["type"], "channel_group.deleted");
    }
}
