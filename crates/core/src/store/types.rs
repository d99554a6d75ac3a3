//! Core acquisition data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Enumerations
// ============================================================================

/// How a source produces torrents: a polled feed or a one-shot magnet link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// RSS or Atom feed that is polled on an interval.
    Feed,
    /// A single magnet URI ingested once.
    Magnet,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Feed => "feed",
            SourceKind::Magnet => "magnet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feed" => Some(SourceKind::Feed),
            "magnet" => Some(SourceKind::Magnet),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of media a source tracks. Determines library layout and whether
/// episode extraction applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Tv,
    Movie,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Tv => "tv",
            MediaType::Movie => "movie",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tv" => Some(MediaType::Tv),
            "movie" => Some(MediaType::Movie),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a tracked torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentStatus {
    /// Known but not yet handed to the download client.
    Pending,
    /// Accepted by the download client, being fetched.
    Downloading,
    /// Fully downloaded and seeding or finished.
    Completed,
    /// Could not be added or polled; eligible for retry.
    Failed,
    /// Removed from tracking. The row survives so the hash stays deduplicated.
    Deleted,
}

impl TorrentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentStatus::Pending => "pending",
            TorrentStatus::Downloading => "downloading",
            TorrentStatus::Completed => "completed",
            TorrentStatus::Failed => "failed",
            TorrentStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TorrentStatus::Pending),
            "downloading" => Some(TorrentStatus::Downloading),
            "completed" => Some(TorrentStatus::Completed),
            "failed" => Some(TorrentStatus::Failed),
            "deleted" => Some(TorrentStatus::Deleted),
            _ => None,
        }
    }

    /// Whether a status change is legal. Progress is forward-only except for
    /// the failed -> pending retry edge and deletion of unfinished torrents.
    pub fn can_transition_to(&self, next: TorrentStatus) -> bool {
        use TorrentStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading)
                | (Downloading, Completed)
                | (Pending, Failed)
                | (Downloading, Failed)
                | (Failed, Pending)
                | (Pending, Deleted)
                | (Failed, Deleted)
        )
    }
}

impl fmt::Display for TorrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a file inside a completed torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Main-sequence episode of a TV source, or the feature of a movie source.
    Episode,
    /// OVA, SP or other off-sequence extra.
    Special,
    /// Subtitle track.
    Subtitle,
    /// Anything else worth keeping a record of.
    Other,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Episode => "episode",
            FileKind::Special => "special",
            FileKind::Subtitle => "subtitle",
            FileKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "episode" => Some(FileKind::Episode),
            "special" => Some(FileKind::Special),
            "subtitle" => Some(FileKind::Subtitle),
            "other" => Some(FileKind::Other),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the most recent hardlink attempt for a file.
/// `None` on the entity means no attempt has been made yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HardlinkStatus {
    /// Queued for an attempt. The pipeline itself writes only the two
    /// terminal states; rows start at NULL.
    Pending,
    Completed,
    Failed,
}

impl HardlinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardlinkStatus::Pending => "pending",
            HardlinkStatus::Completed => "completed",
            HardlinkStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(HardlinkStatus::Pending),
            "completed" => Some(HardlinkStatus::Completed),
            "failed" => Some(HardlinkStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for HardlinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A configured acquisition source: a feed that is polled, or a single
/// magnet link. Owns every torrent it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub kind: SourceKind,
    /// Feed URL for feed sources, magnet URI for magnet sources.
    pub url: String,
    pub media_type: MediaType,
    /// Display title, also the library directory name.
    pub title: String,
    /// External catalog identifier, if the source was matched to one.
    pub catalog_id: Option<String>,
    /// Season number for TV sources. `None` means season 1.
    pub season: Option<i64>,
    /// Ask the language model for episode numbers before falling back to rules.
    pub use_llm_episode: bool,
    /// Custom episode-number pattern. Takes precedence over everything else.
    pub episode_regex: Option<String>,
    /// Signed offset added to every extracted episode number.
    pub episode_offset: i64,
    /// Seconds between feed polls.
    pub check_interval: i64,
    pub last_check: Option<DateTime<Utc>>,
    /// Set when the source no longer updates; due queries skip it.
    pub outdated: bool,
    pub created_at: DateTime<Utc>,
}

impl Source {
    /// Season used when building library paths.
    pub fn effective_season(&self) -> i64 {
        self.season.unwrap_or(1)
    }

    /// Whether the source should be polled at `now`, honoring its interval.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.outdated {
            return false;
        }
        match self.last_check {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(self.check_interval),
        }
    }
}

/// A torrent tracked from discovery through download to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    pub id: i64,
    /// 40 char lowercase hex info-hash. Unique across all rows.
    pub hash: String,
    pub source_id: i64,
    /// Magnet URI handed to the download client.
    pub url: String,
    pub title: Option<String>,
    pub status: TorrentStatus,
    /// Download completion in `[0.0, 1.0]`.
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Torrent {
    /// Title to show in logs and notifications.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.hash)
    }
}

/// One file inside a completed torrent, classified and optionally linked
/// into the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: i64,
    pub torrent_id: i64,
    /// Basename of the file.
    pub name: String,
    /// Path relative to the download client's save directory.
    pub path: String,
    pub size: i64,
    pub kind: FileKind,
    /// Episode number as parsed from the name, before any offset.
    pub extracted_episode: Option<i64>,
    /// Episode number after applying the source offset. Used for naming.
    pub final_episode: Option<i64>,
    pub hardlink_path: Option<String>,
    pub hardlink_status: Option<HardlinkStatus>,
    pub hardlink_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MediaFile {
    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// A file joined with the torrent and source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileDetails {
    pub file: MediaFile,
    pub torrent: Torrent,
    pub source: Source,
}
