pub mod key_builder;
pub mod refresh_cache;

pub use key_builder::KeyBuilder;
pub use refresh_cache::{CachedPayload, RefreshCache};
