//! Pipeline error types.

use thiserror::Error;

use crate::downloader::DownloadClientError;
use crate::feed::FeedError;
use crate::metainfo::FetchError;
use crate::store::StoreError;

/// Errors surfaced by pipeline phases. Most of these are contained at
/// the item they occurred on and only ever reach a log line.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("download client error: {0}")]
    Client(#[from] DownloadClientError),

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("torrent fetch error: {0}")]
    Fetch(#[from] FetchError),
}
