use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{parse_response, FetchResponse, Fetcher};

/// Reads `{dir}/{target}.json` on every fetch, so editing a fixture shows up
/// on the source's next tick.
#[derive(Debug, Clone)]
pub struct FixtureFetcher {
    dir: PathBuf,
}

impl FixtureFetcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, target: &str) -> PathBuf {
        self.dir.join(format!("{target}.json"))
    }
}

#[async_trait]
impl Fetcher for FixtureFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse> {
        let path = self.path_for(target);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading fixture {}", path.display()))?;
        parse_response(&content).with_context(|| format!("decode fixture {}", path.display()))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
