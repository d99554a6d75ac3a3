//! Download client abstraction and the qBittorrent implementation.

mod qbittorrent;
mod types;

pub use qbittorrent::QbClient;
pub use types::{DownloadClient, DownloadClientError, DownloadInfo, RemoteFile};
