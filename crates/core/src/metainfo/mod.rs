//! Torrent metadata handling: bencode codec, validated torrent files,
//! magnet URIs, and cached .torrent downloads.

pub mod bencode;
pub mod fetch;
pub mod magnet;
mod torrent;

pub use bencode::{BencodeError, Value};
pub use fetch::{magnet_from_torrent, FetchError, TorrentFetcher};
pub use magnet::{MagnetError, MagnetInfo};
pub use torrent::{MetainfoError, Torrent, TorrentFile};
