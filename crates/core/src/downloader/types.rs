//! Types for download client operations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while talking to the download client.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent rejected by client: {0}")]
    AddRejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// Live information about a torrent inside the download client.
///
/// `state` is the client-native string; completion is judged from it
/// rather than from a normalized enum so that client quirks stay visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    /// Client-native state string (e.g., "downloading", "stalledUP").
    pub state: String,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Directory the client saves this torrent into.
    pub save_path: Option<String>,
    /// Total size in bytes.
    pub size: i64,
}

impl DownloadInfo {
    /// A torrent counts as complete once the client moved it to a seeding
    /// style state with all pieces present. Merely hitting progress 1.0 in
    /// a checking or moving state is not enough.
    pub fn is_complete(&self) -> bool {
        matches!(self.state.as_str(), "uploading" | "stalledUP" | "queuedUP")
            && self.progress >= 1.0
    }
}

/// One file of a torrent, as reported by the download client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFile {
    /// Basename of the file.
    pub name: String,
    /// Path relative to the client's save directory.
    pub path: String,
    /// Size in bytes.
    pub size: i64,
}

/// Trait for download client backends.
///
/// Sessions are opened for a batch of calls and closed afterwards, never
/// held across scheduler cycles.
#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Authenticate against the client.
    async fn open_session(&self) -> Result<(), DownloadClientError>;

    /// Drop the authenticated session.
    async fn close_session(&self) -> Result<(), DownloadClientError>;

    /// Add a magnet URI. Adding a torrent the client already knows is
    /// success, not an error.
    async fn add_magnet(
        &self,
        uri: &str,
        save_path: Option<&str>,
    ) -> Result<(), DownloadClientError>;

    /// Whether the client currently tracks this hash.
    async fn exists(&self, hash: &str) -> Result<bool, DownloadClientError>;

    /// Live info for one torrent, `None` when the client does not know it.
    async fn info(&self, hash: &str) -> Result<Option<DownloadInfo>, DownloadClientError>;

    /// Files of a torrent.
    async fn list_files(&self, hash: &str) -> Result<Vec<RemoteFile>, DownloadClientError>;

    async fn pause(&self, hash: &str) -> Result<(), DownloadClientError>;

    async fn resume(&self, hash: &str) -> Result<(), DownloadClientError>;

    async fn recheck(&self, hash: &str) -> Result<(), DownloadClientError>;

    /// Remove a torrent. If `delete_files` is true, also delete its data.
    async fn delete(&self, hash: &str, delete_files: bool) -> Result<(), DownloadClientError>;
}
