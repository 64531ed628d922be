// src/fetch/mod.rs
pub mod fixture;
pub mod http;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::sync::Arc;

use crate::cache::Payload;
use crate::config::{FetchConfig, FetchMode};

/// Raw answer from a data source: zero or more result sets plus a status code.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FetchResponse {
    pub recordsets: Vec<Payload>,
    #[serde(default, rename = "returnValue", alias = "return_value")]
    pub return_value: i64,
}

impl FetchResponse {
    pub fn single(payload: Payload) -> Self {
        Self {
            recordsets: vec![payload],
            return_value: 0,
        }
    }

    /// Accept only a clean, single-result answer.
    pub fn into_single(self) -> Result<Payload> {
        if self.return_value != 0 {
            bail!("return value: {}", self.return_value);
        }
        let mut sets = self.recordsets;
        if sets.len() != 1 {
            bail!("expecting 1 result set, got {}", sets.len());
        }
        Ok(sets.remove(0))
    }
}

/// Parse the `{"recordsets": [...], "returnValue": 0}` envelope shared by
/// the HTTP and fixture fetchers.
pub fn parse_response(body: &str) -> Result<FetchResponse> {
    let trimmed = body.trim();
    if trimmed.is_empty() || trimmed == "null" {
        bail!("empty response body");
    }
    serde_json::from_str(trimmed).context("parse fetch response JSON")
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, target: &str) -> Result<FetchResponse>;
    fn name(&self) -> &'static str;
}

/// Build the fetcher selected by config.
pub fn build_fetcher(cfg: &FetchConfig) -> Result<Arc<dyn Fetcher>> {
    Ok(match cfg.mode {
        FetchMode::Http => {
            let base = cfg
                .base_url
                .clone()
                .context("fetch.base_url is required in http mode")?;
            Arc::new(http::HttpFetcher::new(base, cfg.timeout())?)
        }
        FetchMode::Fixture => Arc::new(fixture::FixtureFetcher::new(cfg.fixture_dir.clone())),
    })
}
