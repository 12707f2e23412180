//! External collaborator entities (§3): stream/channel profiles, logos and
//! EPG data are owned by other subsystems. The core only reads them to bind
//! a `Channel` or `Stream` by id — it never creates, updates, or deletes
//! them, so these are thin read-models, not full aggregate roots.

use serde::{Deserialize, Serialize};

use super::{ChannelProfileId, EpgDataId, LogoId, StreamProfileId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamProfile {
    pub id: StreamProfileId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelProfile {
    pub id: ChannelProfileId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logo {
    pub id: LogoId,
    pub url: String,
}

/// An EPG data binding, looked up by `tvg_id` when the auto-channel
/// projector wires a channel's guide data (§4.6 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgData {
    pub id: EpgDataId,
    pub tvg_id: String,
}
