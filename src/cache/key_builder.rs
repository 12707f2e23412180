//! Unified Redis key builder (§10.5): every key shape the pipeline touches
//! lives here, the same centralization pattern the teacher uses for its
//! own Redis surface.
//!
//! # Design principles
//!
//! - All keys use a configurable prefix (default: "catalog")
//! - Consistent naming convention for easy debugging
//! - Support for multi-environment isolation

use crate::Config;

#[derive(Clone)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.redis.key_prefix.clone())
    }

    #[must_use]
    pub fn default() -> Self {
        Self::new("catalog")
    }

    /// Task lock key body, `<operation>:<resource-id>` (§4.8). `DistributedLock`
    /// itself prepends the literal `lock:` prefix, so the key that actually
    /// lands in Redis is `lock:<operation>:<resource-id>` with no
    /// `redis.key_prefix` folded in — lock keys are deliberately global across
    /// environments sharing one Redis, the same way the teacher's
    /// `DistributedLock` treats them.
    #[must_use]
    pub fn task_lock(&self, operation: &str, resource_id: &str) -> String {
        format!("{operation}:{resource_id}")
    }

    /// Progress pub/sub channel, one per source (§6 "Progress channel").
    #[must_use]
    pub fn progress_channel(&self, source_id: &str) -> String {
        format!("{}:progress:{}", self.prefix, source_id)
    }

    /// Refresh-cache freshness mirror (§10.5); the authoritative cache is
    /// the on-disk file, this key only mirrors its state for a dashboard.
    #[must_use]
    pub fn refresh_cache(&self, source_id: &str) -> String {
        format!("{}:refresh_cache:{}", self.prefix, source_id)
    }

    /// Event bus stream key (§6 "Outbound events"), a single Redis Stream
    /// every domain event is `XADD`ed onto.
    #[must_use]
    pub fn event_stream(&self) -> String {
        format!("{}:events", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_lock_key_follows_operation_resource_shape() {
        let builder = KeyBuilder::default();
        assert_eq!(
            builder.task_lock("refresh_single_source", "src1"),
            "refresh_single_source:src1"
        );
    }

    #[test]
    fn progress_channel_key_is_per_source() {
        let builder = KeyBuilder::new("prod");
        assert_eq!(builder.progress_channel("src1"), "prod:progress:src1");
    }

    #[test]
    fn refresh_cache_key_is_per_source() {
        let builder = KeyBuilder::default();
        assert_eq!(builder.refresh_cache("src1"), "catalog:refresh_cache:src1");
    }

    #[test]
    fn event_stream_key_is_prefixed() {
        let builder = KeyBuilder::new("prod");
        assert_eq!(builder.event_stream(), "prod:events");
    }
}
