use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_DEV_LOG: &str = "FEED_DEV_LOG";

/// Dev environment = debug build OR SHUTTLE_ENV in {local, development, dev}.
pub fn is_dev_env() -> bool {
    cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        )
}

/// Enable compact tracing logs in development only.
/// Activation requires BOTH a dev environment and FEED_DEV_LOG=1.
/// A subscriber installed by the runtime wins; this is then a no-op.
pub fn enable_dev_tracing() {
    let dev_flag = std::env::var(ENV_DEV_LOG)
        .ok()
        .is_some_and(|v| v == "1");

    if !(dev_flag && is_dev_env()) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}
