//! Storage traits and request types for sources, torrents and files.

use thiserror::Error;

use chrono::{DateTime, Utc};

use super::{
    FileDetails, FileKind, MediaFile, MediaType, Source, SourceKind, Torrent, TorrentStatus,
};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("source not found: {0}")]
    SourceNotFound(i64),

    #[error("torrent not found: {0}")]
    TorrentNotFound(i64),

    #[error("file not found: {0}")]
    FileNotFound(i64),

    #[error("cannot move torrent {torrent_id} from {from} to {to}")]
    InvalidTransition {
        torrent_id: i64,
        from: TorrentStatus,
        to: TorrentStatus,
    },

    #[error("duplicate torrent hash: {0}")]
    DuplicateHash(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Request to register a new source.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub kind: SourceKind,
    pub url: String,
    pub media_type: MediaType,
    pub title: String,
    pub catalog_id: Option<String>,
    pub season: Option<i64>,
    pub use_llm_episode: bool,
    pub episode_regex: Option<String>,
    pub episode_offset: i64,
    pub check_interval: i64,
}

impl NewSource {
    /// A feed source with defaults for the optional knobs.
    pub fn feed(url: impl Into<String>, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Feed,
            url: url.into(),
            media_type,
            title: title.into(),
            catalog_id: None,
            season: None,
            use_llm_episode: false,
            episode_regex: None,
            episode_offset: 0,
            check_interval: 3600,
        }
    }

    /// A magnet source with defaults for the optional knobs.
    pub fn magnet(url: impl Into<String>, media_type: MediaType, title: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Magnet,
            ..Self::feed(url, media_type, title)
        }
    }

    pub fn with_season(mut self, season: i64) -> Self {
        self.season = Some(season);
        self
    }

    pub fn with_episode_offset(mut self, offset: i64) -> Self {
        self.episode_offset = offset;
        self
    }

    pub fn with_episode_regex(mut self, regex: impl Into<String>) -> Self {
        self.episode_regex = Some(regex.into());
        self
    }

    pub fn with_llm_episode(mut self, enabled: bool) -> Self {
        self.use_llm_episode = enabled;
        self
    }

    pub fn with_check_interval(mut self, seconds: i64) -> Self {
        self.check_interval = seconds;
        self
    }
}

/// Request to track a newly discovered torrent. Inserted as pending.
#[derive(Debug, Clone)]
pub struct NewTorrent {
    /// 40 char hex info-hash, any case. Stored lowercased.
    pub hash: String,
    pub source_id: i64,
    /// Magnet URI to hand to the download client.
    pub url: String,
    pub title: Option<String>,
}

/// Request to record a classified file of a completed torrent.
#[derive(Debug, Clone)]
pub struct NewMediaFile {
    pub torrent_id: i64,
    pub name: String,
    pub path: String,
    pub size: i64,
    pub kind: FileKind,
    pub extracted_episode: Option<i64>,
    pub final_episode: Option<i64>,
}

/// Persistence for acquisition sources.
pub trait SourceStore: Send + Sync {
    /// Insert a source. Rejects empty url/title and non-positive intervals.
    fn create(&self, request: NewSource) -> Result<Source, StoreError>;

    fn get(&self, id: i64) -> Result<Option<Source>, StoreError>;

    fn list(&self) -> Result<Vec<Source>, StoreError>;

    /// Feed sources that should be polled at `now`. Skips outdated sources
    /// and sources whose interval has not elapsed since `last_check`.
    fn feeds_due(&self, now: DateTime<Utc>) -> Result<Vec<Source>, StoreError>;

    /// Magnet sources that have not produced a torrent row yet.
    fn magnets_without_torrent(&self) -> Result<Vec<Source>, StoreError>;

    fn touch_last_check(&self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;

    fn set_outdated(&self, id: i64, outdated: bool) -> Result<(), StoreError>;

    /// Remove a source and, through cascade, its torrents and files.
    /// Returns whether a row was removed.
    fn delete(&self, id: i64) -> Result<bool, StoreError>;
}

/// Persistence for tracked torrents.
pub trait TorrentStore: Send + Sync {
    /// Insert a pending torrent. The hash is lowercased and must be unused.
    fn create(&self, request: NewTorrent) -> Result<Torrent, StoreError>;

    fn get(&self, id: i64) -> Result<Option<Torrent>, StoreError>;

    fn get_by_hash(&self, hash: &str) -> Result<Option<Torrent>, StoreError>;

    /// Whether any row carries this hash, deleted tombstones included.
    fn hash_exists(&self, hash: &str) -> Result<bool, StoreError>;

    fn list_by_status(&self, status: TorrentStatus) -> Result<Vec<Torrent>, StoreError>;

    fn list_for_source(&self, source_id: i64) -> Result<Vec<Torrent>, StoreError>;

    /// Completed torrents whose files have not been cataloged yet.
    fn completed_without_files(&self) -> Result<Vec<Torrent>, StoreError>;

    /// Move a torrent to `status`, validating the transition. Stamps
    /// `started_at` on the first move to downloading and `completed_at` on
    /// completion. `error` is recorded on failure and cleared otherwise.
    fn set_status(
        &self,
        id: i64,
        status: TorrentStatus,
        error: Option<&str>,
    ) -> Result<Torrent, StoreError>;

    /// Update download progress. Must be within `[0.0, 1.0]`.
    fn set_progress(&self, id: i64, progress: f64) -> Result<(), StoreError>;
}

/// Persistence for files of completed torrents.
pub trait FileStore: Send + Sync {
    fn create(&self, request: NewMediaFile) -> Result<MediaFile, StoreError>;

    fn get(&self, id: i64) -> Result<Option<MediaFile>, StoreError>;

    fn list_for_torrent(&self, torrent_id: i64) -> Result<Vec<MediaFile>, StoreError>;

    fn count_for_torrent(&self, torrent_id: i64) -> Result<i64, StoreError>;

    /// Files other than `excluding_id` already claiming `hardlink_path`.
    fn conflicting_hardlinks(
        &self,
        hardlink_path: &str,
        excluding_id: i64,
    ) -> Result<Vec<MediaFile>, StoreError>;

    /// Record a successful hardlink: sets the path, marks completed and
    /// clears any previous error.
    fn record_hardlink(&self, id: i64, path: &str) -> Result<MediaFile, StoreError>;

    /// Record a failed hardlink attempt with its reason.
    fn record_hardlink_failure(&self, id: i64, error: &str) -> Result<MediaFile, StoreError>;

    /// A file joined with its torrent and source.
    fn file_details(&self, id: i64) -> Result<Option<FileDetails>, StoreError>;
}
