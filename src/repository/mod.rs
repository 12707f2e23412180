pub mod channel;
pub mod external;
pub mod filter;
pub mod group;
pub mod settings;
pub mod source;
pub mod stream;

pub use channel::ChannelRepository;
pub use external::{ChannelProfileRepository, EpgDataRepository, LogoRepository, StreamProfileRepository};
pub use filter::{compile_filters, passes_filters, CompiledFilter};
pub use group::GroupRepository;
pub use settings::SettingsRepository;
pub use source::SourceRepository;
pub use stream::StreamRepository;
