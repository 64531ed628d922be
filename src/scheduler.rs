// src/scheduler.rs
//! Per-source refresh loops.
//!
//! Every source runs in its own task: wait one interval, fetch, update the
//! cache and broadcast on success, log and skip on failure, repeat. The first
//! fetch happens one full interval after start, and each later wait starts
//! when the previous cycle ends. A cycle never overlaps the
//! previous one for the same source; different sources never wait on each other.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::cache::Cache;
use crate::fetch::{FetchResponse, Fetcher};
use crate::hub::Broadcaster;
use crate::source::SourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cache updated and the payload broadcast.
    Updated,
    /// Fetch failed or returned an unexpected shape; nothing changed.
    Failed,
}

#[derive(Clone)]
pub struct RefreshScheduler {
    cache: Arc<Cache>,
    fetcher: Arc<dyn Fetcher>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl RefreshScheduler {
    pub fn new(
        cache: Arc<Cache>,
        fetcher: Arc<dyn Fetcher>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            broadcaster,
        }
    }

    /// One fetch cycle for `source`.
    pub async fn run_cycle(&self, source: &SourceDescriptor) -> CycleOutcome {
        tracing::info!(target: "feed", source = %source.name, fetcher = self.fetcher.name(), "refresh data");

        let t0 = Instant::now();
        let result = self
            .fetcher
            .fetch(&source.target)
            .await
            .and_then(FetchResponse::into_single);
        histogram!("feed_fetch_ms", "source" => source.name.clone())
            .record(t0.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(payload) => {
                // Broadcast under the slot lock so a concurrent catch-up for
                // this source is ordered strictly before or after it.
                self.cache
                    .set_then(&source.name, Arc::new(payload), |entry| {
                        tracing::info!(target: "feed", source = %source.name, "emit data");
                        self.broadcaster
                            .broadcast(&entry.source, entry.payload.clone());
                    });

                counter!("feed_refresh_total", "source" => source.name.clone(), "outcome" => "ok")
                    .increment(1);
                gauge!("feed_last_success_ts", "source" => source.name.clone())
                    .set(chrono::Utc::now().timestamp() as f64);
                CycleOutcome::Updated
            }
            Err(e) => {
                tracing::error!(
                    target: "feed",
                    source = %source.name,
                    target_id = %source.target,
                    error = %format!("{e:#}"),
                    "refresh failed; keeping last value"
                );
                counter!("feed_refresh_total", "source" => source.name.clone(), "outcome" => "error")
                    .increment(1);
                CycleOutcome::Failed
            }
        }
    }

    /// Run the refresh loop for one source forever.
    pub async fn run(self, source: SourceDescriptor) {
        let mut period = source.refresh_interval();
        if period.is_zero() {
            tracing::warn!(target: "feed", source = %source.name, "zero refresh interval; using 1s");
            period = Duration::from_secs(1);
        }

        // The wait starts when the previous cycle ends, so a slow or hung
        // upstream is still polled at most once per period.
        loop {
            time::sleep(period).await;
            self.run_cycle(&source).await;
        }
    }

    pub fn spawn(&self, source: SourceDescriptor) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(this.run(source))
    }

    /// Start one independent loop per source. Handles are returned so the
    /// embedder can abort them; dropping them leaves the loops running.
    pub fn spawn_all(&self, sources: &[SourceDescriptor]) -> Vec<JoinHandle<()>> {
        crate::metrics::ensure_metrics_described();
        sources
            .iter()
            .map(|s| {
                tracing::info!(
                    target: "feed",
                    source = %s.name,
                    interval_secs = s.refresh_interval_secs,
                    "scheduling refresh"
                );
                self.spawn(s.clone())
            })
            .collect()
    }
}
