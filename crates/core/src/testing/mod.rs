//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of the external service
//! traits so full acquisition cycles can run without a tracker, a
//! download client or a swarm.
//!
//! # Example
//!
//! ```rust,ignore
//! use gleaner_core::testing::{MockDownloadClient, MockFeedFetcher};
//!
//! let client = MockDownloadClient::new();
//! let feeds = MockFeedFetcher::new();
//!
//! // Configure mock responses
//! feeds.set_feed("https://example.com/rss", fixtures::magnet_feed(&[("Show - 01", &hash)])).await;
//! client.set_progress("hash", 0.5).await;
//!
//! // Use in PipelineDeps...
//! ```

mod mock_download_client;
mod mock_feed_fetcher;
mod mock_notifier;
mod mock_resolver;

pub use mock_download_client::{MockDownloadClient, RecordedAdd};
pub use mock_feed_fetcher::MockFeedFetcher;
pub use mock_notifier::{MockNotifier, SentNotification};
pub use mock_resolver::MockResolver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::downloader::{DownloadInfo, RemoteFile};
    use crate::feed::{Feed, FeedItem};

    /// Deterministic 40 char hex info-hash from a seed.
    pub fn hex_hash(seed: u32) -> String {
        format!("{:040x}", seed)
    }

    /// Minimal magnet URI for an info-hash.
    pub fn magnet_uri(hash: &str) -> String {
        format!("magnet:?xt=urn:btih:{}", hash)
    }

    /// A feed item whose link is a magnet URI.
    pub fn magnet_item(title: &str, hash: &str) -> FeedItem {
        FeedItem {
            title: Some(title.to_string()),
            link: Some(magnet_uri(hash)),
            ..Default::default()
        }
    }

    /// A feed of magnet items, one per `(title, hash)` pair.
    pub fn magnet_feed(entries: &[(&str, &str)]) -> Feed {
        Feed {
            title: Some("Test Feed".to_string()),
            items: entries
                .iter()
                .map(|(title, hash)| magnet_item(title, hash))
                .collect(),
        }
    }

    /// Download info with reasonable defaults for the remaining fields.
    pub fn download_info(hash: &str, state: &str, progress: f64) -> DownloadInfo {
        DownloadInfo {
            hash: hash.to_string(),
            name: format!("Mock Download {}", &hash[..8.min(hash.len())]),
            state: state.to_string(),
            progress,
            save_path: Some("/mock/downloads".to_string()),
            size: 1024 * 1024 * 700,
        }
    }

    /// A remote file living directly under the save directory.
    pub fn remote_file(name: &str, size: i64) -> RemoteFile {
        RemoteFile {
            name: name.to_string(),
            path: name.to_string(),
            size,
        }
    }

    /// A remote video file with a plausible size.
    pub fn video_file(name: &str) -> RemoteFile {
        remote_file(name, 1024 * 1024 * 700)
    }
}
