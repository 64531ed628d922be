// tests/feed_config.rs
use std::{env, fs};

use dashboard_feed::config::feed::{
    DEFAULT_CONFIG_PATH, ENV_CONFIG_PATH, ENV_FETCH_BASE_URL, ENV_FETCH_MODE,
};
use dashboard_feed::config::{FeedConfig, FetchMode};
use dashboard_feed::source::default_sources;

fn clear_env() {
    env::remove_var(ENV_CONFIG_PATH);
    env::remove_var(ENV_FETCH_BASE_URL);
    env::remove_var(ENV_FETCH_MODE);
}

#[serial_test::serial]
#[test]
fn load_from_file_with_env_base_url() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("feed.toml");
    fs::write(
        &p,
        r#"
[[sources]]
name = "summary"
target = "GetSummary"
refresh_interval_secs = 10
"#,
    )
    .unwrap();

    // http mode without base_url is invalid...
    assert!(FeedConfig::load_from(&p).is_err());

    // ...until the env supplies one.
    env::set_var(ENV_FETCH_BASE_URL, "http://127.0.0.1:9000/procs");
    let cfg = FeedConfig::load_from(&p).unwrap();
    assert_eq!(cfg.fetch.base_url.as_deref(), Some("http://127.0.0.1:9000/procs"));
    assert_eq!(cfg.sources.len(), 1);
    clear_env();
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    clear_env();
    // Isolate CWD so a real config/ in the repo does not interfere.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // No file anywhere → built-in dashboard sources (fixture mode needs no URL).
    env::set_var(ENV_FETCH_MODE, "fixture");
    let cfg = FeedConfig::load_default().unwrap();
    assert_eq!(cfg.sources, default_sources());
    assert_eq!(cfg.fetch.mode, FetchMode::Fixture);

    // config/feed.toml in CWD is picked up.
    fs::create_dir_all("config").unwrap();
    fs::write(
        DEFAULT_CONFIG_PATH,
        "[[sources]]\nname = \"x\"\ntarget = \"GetX\"\nrefresh_interval_secs = 5\n",
    )
    .unwrap();
    let cfg = FeedConfig::load_default().unwrap();
    assert_eq!(cfg.sources.len(), 1);
    assert_eq!(cfg.sources[0].name, "x");

    // Env path has priority, and must exist.
    let p = tmp.path().join("other.toml");
    fs::write(
        &p,
        "[[sources]]\nname = \"y\"\ntarget = \"GetY\"\nrefresh_interval_secs = 7\n",
    )
    .unwrap();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    let cfg = FeedConfig::load_default().unwrap();
    assert_eq!(cfg.sources[0].name, "y");

    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(FeedConfig::load_default().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn bad_fetch_mode_in_env_is_an_error() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("feed.toml");
    fs::write(&p, "[fetch]\nmode = \"fixture\"\n").unwrap();

    env::set_var(ENV_FETCH_MODE, "odbc");
    assert!(FeedConfig::load_from(&p).is_err());
    clear_env();
}
