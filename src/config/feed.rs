// src/config/feed.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::{default_sources, SourceDescriptor};

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_FETCH_BASE_URL: &str = "FEED_FETCH_BASE_URL";
pub const ENV_FETCH_MODE: &str = "FEED_FETCH_MODE";
pub const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

fn default_timeout_secs() -> u64 {
    60
}
fn default_fixture_dir() -> PathBuf {
    PathBuf::from("fixtures")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Http,
    Fixture,
}

impl FetchMode {
    fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "fixture" | "fixtures" => Ok(Self::Fixture),
            other => bail!("unsupported fetch mode: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout; the dashboard's stored procedures may take a while.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::default(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
            fixture_dir: default_fixture_dir(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedConfig {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceDescriptor>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            sources: default_sources(),
        }
    }
}

impl FeedConfig {
    /// Load from an explicit TOML path, apply env overrides and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading feed config from {}", path.display()))?;
        let cfg = Self::from_toml_str(&content)
            .with_context(|| format!("parsing feed config {}", path.display()))?;
        cfg.finish()
    }

    /// Resolve config using env var + fallbacks:
    /// 1) $FEED_CONFIG_PATH
    /// 2) config/feed.toml
    /// 3) built-in dashboard sources
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Self::default().finish()
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: FeedConfig = toml::from_str(s)?;
        Ok(cfg)
    }

    fn finish(mut self) -> Result<Self> {
        self.apply_env()?;
        self.validate()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_FETCH_BASE_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.fetch.base_url = Some(url.to_string());
            }
        }
        if let Ok(mode) = std::env::var(ENV_FETCH_MODE) {
            self.fetch.mode = FetchMode::parse(&mode)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if s.name.trim().is_empty() {
                bail!("source with empty name");
            }
            // The name is written verbatim as the SSE `event:` line.
            if s.name.contains(['\n', '\r']) {
                bail!("source name {:?} contains a line break", s.name);
            }
            if s.target.trim().is_empty() {
                bail!("source '{}' has an empty target", s.name);
            }
            if s.refresh_interval_secs == 0 {
                bail!("source '{}' must have refresh_interval_secs > 0", s.name);
            }
            if !seen.insert(s.name.as_str()) {
                bail!("duplicate source name '{}'", s.name);
            }
        }
        if self.fetch.mode == FetchMode::Http && self.fetch.base_url.is_none() {
            bail!("fetch.base_url (or {ENV_FETCH_BASE_URL}) is required in http mode");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[fetch]
mode = "fixture"
fixture_dir = "demo/fixtures"

[[sources]]
name = "summary"
target = "GetSummary"
refresh_interval_secs = 10

[[sources]]
name = "lastHour"
target = "GetDataLastHour"
refresh_interval_secs = 30
"#;

    #[test]
    fn parses_sources_in_file_order() {
        let cfg = FeedConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.fetch.mode, FetchMode::Fixture);
        assert_eq!(cfg.fetch.timeout_secs, 60);
        let names: Vec<&str> = cfg.sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["summary", "lastHour"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_sources_table_falls_back_to_dashboard_set() {
        let cfg = FeedConfig::from_toml_str("[fetch]\nmode = \"fixture\"\n").unwrap();
        assert_eq!(cfg.sources, default_sources());
    }

    #[test]
    fn rejects_duplicates_zero_interval_and_empty_names() {
        let mut cfg = FeedConfig::from_toml_str(SAMPLE).unwrap();
        cfg.sources.push(SourceDescriptor::new("summary", "X", 5));
        assert!(cfg.validate().unwrap_err().to_string().contains("duplicate"));

        let mut cfg = FeedConfig::from_toml_str(SAMPLE).unwrap();
        cfg.sources[0].refresh_interval_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = FeedConfig::from_toml_str(SAMPLE).unwrap();
        cfg.sources[1].name = "  ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = FeedConfig::from_toml_str(SAMPLE).unwrap();
        cfg.sources.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn http_mode_requires_base_url() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.fetch.mode, FetchMode::Http);
        assert!(cfg.validate().is_err());

        let mut cfg = FeedConfig::default();
        cfg.fetch.base_url = Some("http://127.0.0.1:9000/procs".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn fetch_mode_parse_is_case_insensitive() {
        assert_eq!(FetchMode::parse("HTTP").unwrap(), FetchMode::Http);
        assert_eq!(FetchMode::parse(" Fixture ").unwrap(), FetchMode::Fixture);
        assert!(FetchMode::parse("mssql").is_err());
    }
}
