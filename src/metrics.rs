use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ENV_METRICS: &str = "FEED_METRICS";

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feed_refresh_total",
            "Refresh cycles per source, labelled by outcome (ok|error)."
        );
        describe_histogram!("feed_fetch_ms", "Fetch duration in milliseconds.");
        describe_gauge!(
            "feed_last_success_ts",
            "Unix ts of the last successful refresh per source."
        );
        describe_gauge!("feed_sources", "Number of configured sources.");
    });
}

pub fn metrics_enabled() -> bool {
    std::env::var(ENV_METRICS).ok().as_deref() == Some("1")
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured source count.
    pub fn init(source_count: usize) -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;

        ensure_metrics_described();
        gauge!("feed_sources").set(source_count as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
