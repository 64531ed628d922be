// src/feed.rs
//! Wiring: one cache, one hub, one scheduler, shared by the refresh loops and
//! the HTTP handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::task::JoinHandle;

use crate::api::{self, AppState};
use crate::cache::Cache;
use crate::config::FeedConfig;
use crate::connection::ConnectionManager;
use crate::fetch::{build_fetcher, Fetcher};
use crate::hub::{SseHub, DEFAULT_SUBSCRIBER_CAPACITY};
use crate::scheduler::RefreshScheduler;
use crate::source::SourceDescriptor;

pub const ENV_STATIC_DIR: &str = "FEED_STATIC_DIR";

pub struct Feed {
    cache: Arc<Cache>,
    hub: Arc<SseHub>,
    connections: ConnectionManager,
    scheduler: RefreshScheduler,
    sources: Arc<Vec<SourceDescriptor>>,
}

impl Feed {
    pub fn new(sources: Vec<SourceDescriptor>, fetcher: Arc<dyn Fetcher>) -> Self {
        let cache = Arc::new(Cache::with_sources(&sources));
        // Room for a full catch-up plus live traffic without dropping.
        let hub = Arc::new(SseHub::with_capacity(
            DEFAULT_SUBSCRIBER_CAPACITY.max(sources.len() * 2),
        ));
        let connections = ConnectionManager::new(cache.clone(), hub.clone());
        let scheduler = RefreshScheduler::new(cache.clone(), fetcher, hub.clone());
        Self {
            cache,
            hub,
            connections,
            scheduler,
            sources: Arc::new(sources),
        }
    }

    pub fn from_config(cfg: &FeedConfig) -> Result<Self> {
        let fetcher = build_fetcher(&cfg.fetch)?;
        tracing::info!(
            target: "feed",
            fetcher = fetcher.name(),
            sources = cfg.sources.len(),
            "feed configured"
        );
        Ok(Self::new(cfg.sources.clone(), fetcher))
    }

    /// Start one refresh loop per source.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.scheduler.spawn_all(&self.sources)
    }

    pub fn state(&self) -> AppState {
        AppState {
            cache: self.cache.clone(),
            hub: self.hub.clone(),
            connections: self.connections.clone(),
            sources: self.sources.clone(),
        }
    }

    /// API router, plus the static UI directory when `FEED_STATIC_DIR` is set.
    pub fn router(&self) -> Router {
        let router = api::create_router(self.state());
        match std::env::var(ENV_STATIC_DIR) {
            Ok(dir) if !dir.trim().is_empty() => {
                let dir = PathBuf::from(dir.trim());
                tracing::info!(target: "feed", dir = %dir.display(), "serving static files");
                api::with_static_dir(router, &dir)
            }
            _ => router,
        }
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn hub(&self) -> &Arc<SseHub> {
        &self.hub
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }
}
