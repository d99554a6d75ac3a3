//! Validated torrent metadata: info-hash computation and file enumeration.

use sha1::{Digest, Sha1};
use thiserror::Error;

use super::bencode::{self, BencodeError, Value};

/// Errors produced while interpreting decoded metadata as a torrent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] BencodeError),

    #[error("top-level value is not a dictionary")]
    NotADict,

    #[error("missing or invalid info dictionary")]
    MissingInfo,

    #[error("info dictionary has no name")]
    MissingName,

    #[error("info dictionary has neither files nor length")]
    MissingFiles,

    #[error("malformed files entry")]
    MalformedFileEntry,
}

/// One file contained in a torrent.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    /// Last path component.
    pub name: String,
    /// Path relative to the torrent root, components joined with '/'.
    pub path: String,
    pub size: i64,
}

/// Decoded and validated torrent metadata.
///
/// The original decoded `info` value is kept so the info-hash is computed
/// over a byte-exact canonical re-encoding, never a reformatted copy.
#[derive(Debug, Clone)]
pub struct Torrent {
    root: Value,
    info: Value,
    name: String,
}

impl Torrent {
    /// Parses a buffer as torrent metadata.
    ///
    /// The buffer is accepted only if it decodes to a dictionary whose
    /// `info` entry is itself a dictionary containing `name` and either a
    /// `files` list or a `length` integer. Anything else is rejected.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let root = bencode::decode(data)?;
        if root.as_dict().is_none() {
            return Err(MetainfoError::NotADict);
        }
        let info = root.get(b"info").ok_or(MetainfoError::MissingInfo)?;
        if info.as_dict().is_none() {
            return Err(MetainfoError::MissingInfo);
        }
        let name = info
            .get(b"name")
            .and_then(Value::as_str_lossy)
            .ok_or(MetainfoError::MissingName)?;
        if info.get(b"files").and_then(Value::as_list).is_none()
            && info.get(b"length").and_then(Value::as_int).is_none()
        {
            return Err(MetainfoError::MissingFiles);
        }
        let info = info.clone();
        Ok(Self { root, info, name })
    }

    /// The torrent's display name from the info dictionary.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// SHA-1 of the canonically re-encoded info dictionary, as 40 lowercase
    /// hex characters.
    pub fn info_hash(&self) -> String {
        let encoded = bencode::encode(&self.info);
        let digest = Sha1::digest(&encoded);
        let mut out = String::with_capacity(40);
        for byte in digest {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }

    /// First announce URL, if present.
    pub fn announce(&self) -> Option<String> {
        self.root.get(b"announce").and_then(Value::as_str_lossy)
    }

    /// All tracker URLs: `announce` plus the flattened `announce-list`,
    /// deduplicated in order.
    pub fn trackers(&self) -> Vec<String> {
        let mut trackers = Vec::new();
        if let Some(announce) = self.announce() {
            trackers.push(announce);
        }
        if let Some(tiers) = self.root.get(b"announce-list").and_then(Value::as_list) {
            for tier in tiers {
                let Some(urls) = tier.as_list() else { continue };
                for url in urls {
                    if let Some(url) = url.as_str_lossy() {
                        if !trackers.contains(&url) {
                            trackers.push(url);
                        }
                    }
                }
            }
        }
        trackers
    }

    /// Enumerates the files contained in this torrent, in metadata order.
    ///
    /// Single-file torrents yield exactly one entry whose name and path are
    /// both the info name.
    pub fn files(&self) -> Result<Vec<TorrentFile>, MetainfoError> {
        if let Some(entries) = self.info.get(b"files").and_then(Value::as_list) {
            let mut files = Vec::with_capacity(entries.len());
            for entry in entries {
                let parts = entry
                    .get(b"path")
                    .and_then(Value::as_list)
                    .ok_or(MetainfoError::MalformedFileEntry)?;
                let size = entry
                    .get(b"length")
                    .and_then(Value::as_int)
                    .ok_or(MetainfoError::MalformedFileEntry)?;
                let components: Vec<String> = parts
                    .iter()
                    .filter_map(Value::as_str_lossy)
                    .collect();
                if components.is_empty() {
                    return Err(MetainfoError::MalformedFileEntry);
                }
                let name = components
                    .last()
                    .cloned()
                    .unwrap_or_default();
                files.push(TorrentFile {
                    name,
                    path: components.join("/"),
                    size,
                });
            }
            Ok(files)
        } else {
            let size = self
                .info
                .get(b"length")
                .and_then(Value::as_int)
                .ok_or(MetainfoError::MissingFiles)?;
            Ok(vec![TorrentFile {
                name: self.name.clone(),
                path: self.name.clone(),
                size,
            }])
        }
    }
}
