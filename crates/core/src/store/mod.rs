//! Persistent state for sources, torrents and their files.

mod sqlite_store;
mod traits;
mod types;

pub use sqlite_store::SqliteStore;
pub use traits::{
    FileStore, NewMediaFile, NewSource, NewTorrent, SourceStore, StoreError, TorrentStore,
};
pub use types::{
    FileDetails, FileKind, HardlinkStatus, MediaFile, MediaType, Source, SourceKind, Torrent,
    TorrentStatus,
};
