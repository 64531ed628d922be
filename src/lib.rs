// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod connection;
pub mod feed;
pub mod fetch;
pub mod hub;
pub mod metrics;
pub mod scheduler;
pub mod source;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::cache::{Cache, CacheEntry, Payload};
pub use crate::config::FeedConfig;
pub use crate::connection::ConnectionManager;
pub use crate::feed::Feed;
pub use crate::fetch::{FetchResponse, Fetcher};
pub use crate::hub::{Broadcaster, FeedEvent, SseHub, SubscriberId, Subscription};
pub use crate::scheduler::{CycleOutcome, RefreshScheduler};
pub use crate::source::SourceDescriptor;

use axum::Router;
use tokio::task::JoinHandle;

/// Load config from the environment, start every refresh loop and return the
/// router plus the loop handles. Used by the binary; tests build `Feed` directly.
pub async fn app() -> anyhow::Result<(Router, Vec<JoinHandle<()>>)> {
    let cfg = FeedConfig::load_default()?;
    let feed = Feed::from_config(&cfg)?;

    let mut router = feed.router();
    if metrics::metrics_enabled() {
        let m = metrics::Metrics::init(feed.sources().len())?;
        router = router.merge(m.router());
    }

    let handles = feed.start();
    Ok((router, handles))
}
