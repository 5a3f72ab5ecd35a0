//! Shared HTTP client and the page image fetcher.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use manga_reader_core::ImageFetcher;

const USER_AGENT: &str = concat!("manga-reader/", env!("CARGO_PKG_VERSION"));

pub fn build_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")
}

/// Downloads page images. The body is read fully so a truncated transfer counts as a failure.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting {url}"))?
            .error_for_status()?;
        let body = response.bytes().await.with_context(|| format!("reading {url}"))?;
        Ok(body.len() as u64)
    }
}
