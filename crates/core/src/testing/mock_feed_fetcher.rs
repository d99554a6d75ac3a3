//! Mock feed fetcher for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::feed::{Feed, FeedError, FeedFetcher};

/// Mock implementation of the FeedFetcher trait. Serves canned feeds
/// keyed by URL and records which URLs were fetched.
#[derive(Debug, Default)]
pub struct MockFeedFetcher {
    feeds: Arc<RwLock<HashMap<String, Feed>>>,
    fetched: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<FeedError>>>,
}

impl MockFeedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `feed` for `url`.
    pub async fn set_feed(&self, url: impl Into<String>, feed: Feed) {
        self.feeds.write().await.insert(url.into(), feed);
    }

    /// URLs fetched so far, in order.
    pub async fn fetched_urls(&self) -> Vec<String> {
        self.fetched.read().await.clone()
    }

    pub async fn fetch_count(&self) -> usize {
        self.fetched.read().await.len()
    }

    /// Configure the next fetch to fail with the given error.
    pub async fn set_next_error(&self, error: FeedError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl FeedFetcher for MockFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError> {
        self.fetched.write().await.push(url.to_string());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        self.feeds
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| FeedError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}
