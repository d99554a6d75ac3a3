//! RSS and Atom feed fetching and parsing.

mod fetcher;
mod parser;
mod types;

pub use fetcher::HttpFeedFetcher;
pub use parser::parse_feed;
pub use types::{Feed, FeedError, FeedFetcher, FeedItem};
