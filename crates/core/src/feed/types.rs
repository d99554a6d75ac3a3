//! Feed data types and the fetcher trait.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

static MAGNET_ANCHOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href="(magnet:[^"]+)""#).unwrap());

/// Error type for feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("xml parse error: {0}")]
    Parse(String),

    #[error("unsupported feed format")]
    UnsupportedFormat,
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        FeedError::Request(e.to_string())
    }
}

/// A parsed feed, RSS or Atom.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

impl Feed {
    /// Feed title with common feed-name noise stripped, for auto-naming
    /// sources after their feed.
    pub fn clean_title(&self) -> Option<String> {
        let title = self.title.as_deref()?.trim();
        if title.is_empty() {
            return None;
        }
        for suffix in [" - RSS", " RSS", " Feed", " feed"] {
            if let Some(stripped) = title.strip_suffix(suffix) {
                return Some(stripped.trim_end().to_string());
            }
        }
        Some(title.to_string())
    }
}

/// One feed entry. Field presence varies wildly between trackers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
    pub enclosure_url: Option<String>,
}

impl FeedItem {
    /// The URL worth downloading for this item, if any.
    ///
    /// A magnet anchor inside the description wins, then the enclosure,
    /// then the item link. Candidates other than the anchor only qualify
    /// when they are a magnet URI or point at a .torrent file.
    pub fn download_url(&self) -> Option<String> {
        if let Some(description) = &self.description {
            if let Some(captures) = MAGNET_ANCHOR_RE.captures(description) {
                // Anchors lifted out of HTML still carry entity-escaped separators.
                return Some(captures[1].replace("&amp;", "&"));
            }
        }

        for candidate in [&self.enclosure_url, &self.link] {
            if let Some(url) = candidate {
                if url.starts_with("magnet:") || url.ends_with(".torrent") {
                    return Some(url.clone());
                }
            }
        }

        None
    }
}

/// Fetches and parses a feed from a URL.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Feed, FeedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_title_strips_suffixes() {
        let feed = |t: &str| Feed {
            title: Some(t.to_string()),
            items: vec![],
        };

        assert_eq!(
            feed("Subs Weekly - RSS").clean_title().as_deref(),
            Some("Subs Weekly")
        );
        assert_eq!(
            feed("Subs Weekly RSS").clean_title().as_deref(),
            Some("Subs Weekly")
        );
        assert_eq!(
            feed("Subs Weekly Feed").clean_title().as_deref(),
            Some("Subs Weekly")
        );
        assert_eq!(
            feed("Subs Weekly feed").clean_title().as_deref(),
            Some("Subs Weekly")
        );
        assert_eq!(
            feed("Subs Weekly").clean_title().as_deref(),
            Some("Subs Weekly")
        );
        assert_eq!(feed("   ").clean_title(), None);
        assert_eq!(Feed::default().clean_title(), None);
    }

    #[test]
    fn test_download_url_prefers_description_anchor() {
        let item = FeedItem {
            description: Some(
                r#"<p>Get it <a href="magnet:?xt=urn:btih:aaaabbbbccccddddeeeeffff0000111122223333">here</a></p>"#
                    .to_string(),
            ),
            enclosure_url: Some("https://tracker.example.com/123.torrent".to_string()),
            link: Some("https://tracker.example.com/view/123".to_string()),
            ..Default::default()
        };

        assert_eq!(
            item.download_url().as_deref(),
            Some("magnet:?xt=urn:btih:aaaabbbbccccddddeeeeffff0000111122223333")
        );
    }

    #[test]
    fn test_download_url_falls_back_to_enclosure_then_link() {
        let item = FeedItem {
            enclosure_url: Some("https://tracker.example.com/123.torrent".to_string()),
            link: Some("https://tracker.example.com/view/123".to_string()),
            ..Default::default()
        };
        assert_eq!(
            item.download_url().as_deref(),
            Some("https://tracker.example.com/123.torrent")
        );

        let item = FeedItem {
            link: Some("magnet:?xt=urn:btih:aaaabbbbccccddddeeeeffff0000111122223333".to_string()),
            ..Default::default()
        };
        assert!(item.download_url().is_some());
    }

    #[test]
    fn test_download_url_rejects_plain_pages() {
        let item = FeedItem {
            enclosure_url: Some("https://tracker.example.com/view/123".to_string()),
            link: Some("https://tracker.example.com/view/123".to_string()),
            ..Default::default()
        };
        assert!(item.download_url().is_none());

        assert!(FeedItem::default().download_url().is_none());
    }
}
