//! HTTP feed fetcher.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{parse_feed, Feed, FeedError, FeedFetcher};

const FETCH_TIMEOUT_SECS: u64 = 30;

/// Fetches feeds over HTTP with an optional proxy.
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new(proxy: Option<&str>) -> Result<Self, FeedError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(concat!("gleaner/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| FeedError::Request(format!("invalid proxy {:?}: {}", proxy_url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        debug!(url, "fetching feed");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;
        parse_feed(&body)
    }
}
