use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{parse_response, FetchResponse, Fetcher};

/// Fetches `GET {base_url}/{target}` and parses the result-set envelope.
#[derive(Clone)]
pub struct HttpFetcher {
    base_url: String,
    client: Client,
}

impl HttpFetcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn url_for(&self, target: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &str) -> Result<FetchResponse> {
        let url = self.url_for(target);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request {url}"))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .with_context(|| format!("read body from {url}"))?;
        if !status.is_success() {
            bail!("{url} returned {status}");
        }
        parse_response(&body).with_context(|| format!("decode response from {url}"))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
