pub mod catalog;
pub mod channel;
pub mod event;
pub mod external;
pub mod group;
pub mod id;
pub mod parsed;
pub mod progress;
pub mod settings;
pub mod source;
pub mod stream;

pub use catalog::{
    build_stream_url, rewrite_url, CatalogAuthResponse, CatalogCategory, CatalogStream,
    CatalogUserInfo, UrlRewriteRule,
};
pub use channel::{
    Channel, ChannelProfileMembership, ChannelSortOrder, ChannelStream,
};
pub use event::DomainEvent;
pub use external::{ChannelProfile, EpgData, Logo, StreamProfile};
pub use group::{custom_property_keys, Group, GroupMembership};
pub use id::{
    generate_id, ChannelId, ChannelProfileId, EpgDataId, FilterId, GroupId, LogoId, SourceId,
    StreamId, StreamProfileId,
};
pub use parsed::{ParseOutput, ParsedGroupInfo, ParsedStream, DEFAULT_GROUP};
pub use progress::{ProgressAction, ProgressEvent, ProgressStatus};
pub use settings::GlobalSettings;
pub use source::{FilterField, Source, SourceEndpoint, SourceKind, SourceStatus, StreamFilter};
pub use stream::{HashKeyField, HashKeyList, Stream, StreamComparableFields};
