//! Dashboard feed — Binary Entrypoint
//! Boots the Axum HTTP server and the per-source refresh loops.

use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    // Initialize dev tracing early (no-op in production).
    dashboard_feed::telemetry::enable_dev_tracing();

    // Refresh loops run for the life of the process; the handles are not needed.
    let (router, _handles) = dashboard_feed::app().await?;
    tracing::info!(target: "feed", "dashboard feed ready");

    Ok(router.into())
}
