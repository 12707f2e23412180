//! Service initialization and dependency injection: wires every repository
//! and pipeline-stage service against the shared `PgPool`/Redis
//! `ConnectionManager`, producing the handful of entry points a caller
//! actually drives (`RefreshOrchestrator`, `Rehasher`).

use sqlx::PgPool;
use tracing::info;

use crate::cache::KeyBuilder;
use crate::repository::{
    ChannelProfileRepository, ChannelRepository, EpgDataRepository, GroupRepository,
    LogoRepository, SettingsRepository, SourceRepository, StreamProfileRepository,
    StreamRepository,
};
use crate::service::{
    AutoChannelProjector, DistributedLock, EventBus, Fetcher, ProgressReporter,
    RefreshOrchestrator, Rehasher, StalePruner, StreamUpserter,
};
use crate::Config;

/// Container for every initialized repository and pipeline service. Cloning
/// a `Services` is cheap — every member wraps a `PgPool` or
/// `ConnectionManager`, both internally `Arc`-backed.
#[derive(Clone)]
pub struct Services {
    pub sources: SourceRepository,
    pub groups: GroupRepository,
    pub streams: StreamRepository,
    pub settings: SettingsRepository,
    pub channels: ChannelRepository,
    pub channel_profiles: ChannelProfileRepository,
    pub stream_profiles: StreamProfileRepository,
    pub logos: LogoRepository,
    pub epg_data: EpgDataRepository,
    pub lock: DistributedLock,
    pub events: EventBus,
    pub progress: ProgressReporter,
    pub orchestrator: std::sync::Arc<RefreshOrchestrator>,
    pub rehasher: std::sync::Arc<Rehasher>,
}

/// Initialize every repository and pipeline-stage service from a connected
/// pool, a loaded `Config`, and a redis connection manager.
pub async fn init_services(pool: PgPool, config: &Config) -> anyhow::Result<Services> {
    info!("Initializing services...");

    let redis_client = redis::Client::open(config.redis.url.clone())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    info!("Redis connection manager established");

    let keys = KeyBuilder::from_config(config);

    let sources = SourceRepository::new(pool.clone());
    let groups = GroupRepository::new(pool.clone());
    let streams = StreamRepository::new(pool.clone());
    let settings = SettingsRepository::new(pool.clone());
    let channels = ChannelRepository::new(pool.clone());
    let channel_profiles = ChannelProfileRepository::new(pool.clone());
    let stream_profiles = StreamProfileRepository::new(pool.clone());
    let logos = LogoRepository::new(pool.clone());
    let epg_data = EpgDataRepository::new(pool.clone());

    let lock = DistributedLock::new(redis_conn.clone());
    let events = EventBus::new(redis_conn.clone(), keys.clone());
    let progress = ProgressReporter::new(redis_conn.clone(), keys.clone(), sources.clone());
    info!("Redis-backed lock, event bus, and progress reporter initialized");

    let fetcher = Fetcher::new(config.fetch.clone());
    let upserter = StreamUpserter::new(pool.clone(), streams.clone(), config.upsert.clone(), events.clone());
    let pruner = StalePruner::new(pool.clone(), streams.clone(), events.clone());
    let projector = AutoChannelProjector::new(
        pool.clone(),
        channels.clone(),
        channel_profiles.clone(),
        logos.clone(),
        epg_data.clone(),
        streams.clone(),
        events.clone(),
    );

    let orchestrator = RefreshOrchestrator::new(
        pool.clone(),
        sources.clone(),
        groups.clone(),
        settings.clone(),
        lock.clone(),
        fetcher,
        upserter,
        pruner,
        projector,
        events.clone(),
        progress.clone(),
        config.fetch.clone(),
        config.task_lock.clone(),
    );
    info!("Refresh orchestrator initialized");

    let rehasher = Rehasher::new(
        pool.clone(),
        streams.clone(),
        channels.clone(),
        sources.clone(),
        settings.clone(),
        lock.clone(),
    );
    info!("Rehasher initialized");

    Ok(Services {
        sources,
        groups,
        streams,
        settings,
        channels,
        channel_profiles,
        stream_profiles,
        logos,
        epg_data,
        lock,
        events,
        progress,
        orchestrator: std::sync::Arc::new(orchestrator),
        rehasher: std::sync::Arc::new(rehasher),
    })
}
