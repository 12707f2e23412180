//! §4.2/C2 Event bus: an outbox-shaped publisher that appends `DomainEvent`s
//! to a Redis Stream. Downstream consumers (outside this crate) read the
//! stream independently; publishing never blocks or fails the caller's
//! transaction (§9 "Signal-based eventing coupled to entity save").

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::cache::KeyBuilder;
use crate::models::DomainEvent;

/// Publishes domain events onto a single Redis Stream (`XADD`). Consumers
/// are expected to track their own position (`XREAD`/consumer groups); this
/// crate only produces.
#[derive(Clone)]
pub struct EventBus {
    redis: ConnectionManager,
    keys: KeyBuilder,
}

impl EventBus {
    #[must_use]
    pub fn new(redis: ConnectionManager, keys: KeyBuilder) -> Self {
        Self { redis, keys }
    }

    /// Publish a single event. Errors are logged and swallowed: a failed
    /// publish must never unwind the pipeline stage that produced it.
    pub async fn publish(&self, event: &DomainEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "failed to serialize domain event");
                return;
            }
        };

        let stream_key = self.keys.event_stream();
        let mut conn = self.redis.clone();
        let result: redis::RedisResult<String> = conn
            .xadd(&stream_key, "*", &[("type", event.name()), ("payload", payload.as_str())])
            .await;

        if let Err(e) = result {
            tracing::warn!(stream = stream_key, event = event.name(), error = %e, "failed to publish domain event");
        }
    }

    /// Publish a batch of events in order. Each is a separate `XADD`; there
    /// is no atomicity guarantee across the batch.
    pub async fn publish_all(&self, events: &[DomainEvent]) {
        for event in events {
            self.publish(event).await;
        }
    }
}
