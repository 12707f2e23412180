pub mod auto_channel_projector;
pub mod catalog_client;
pub mod distributed_lock;
pub mod event_bus;
pub mod fetcher;
pub mod group_reconciler;
pub mod hashing;
pub mod natural_sort;
pub mod orchestrator;
pub mod parser;
pub mod progress_reporter;
pub mod rehasher;
pub mod stale_pruner;
pub mod stream_upserter;

pub use auto_channel_projector::AutoChannelProjector;
pub use catalog_client::CatalogClient;
pub use distributed_lock::{DistributedLock, LockGuard};
pub use event_bus::EventBus;
pub use fetcher::Fetcher;
pub use group_reconciler::GroupReconciler;
pub use orchestrator::{RefreshOrchestrator, RefreshOutcome};
pub use progress_reporter::ProgressReporter;
pub use rehasher::Rehasher;
pub use stale_pruner::StalePruner;
pub use stream_upserter::StreamUpserter;
