//! Mock download client for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::downloader::{DownloadClient, DownloadClientError, DownloadInfo, RemoteFile};
use crate::metainfo::magnet;

/// A recorded add_magnet call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub uri: String,
    pub save_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct MockDownload {
    info: DownloadInfo,
    files: Vec<RemoteFile>,
}

/// Mock implementation of the DownloadClient trait.
///
/// Provides controllable behavior for testing:
/// - Track added magnets for assertions
/// - Control torrent progress and state
/// - Simulate failures
#[derive(Debug)]
pub struct MockDownloadClient {
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    downloads: Arc<RwLock<HashMap<String, MockDownload>>>,
    next_error: Arc<RwLock<Option<DownloadClientError>>>,
    sessions_opened: Arc<RwLock<u32>>,
    sessions_closed: Arc<RwLock<u32>>,
    hash_counter: Arc<RwLock<u32>>,
}

impl Default for MockDownloadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDownloadClient {
    pub fn new() -> Self {
        Self {
            added: Arc::new(RwLock::new(Vec::new())),
            downloads: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            sessions_opened: Arc::new(RwLock::new(0)),
            sessions_closed: Arc::new(RwLock::new(0)),
            hash_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// All recorded add_magnet calls.
    pub async fn added_magnets(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    pub async fn clear_recorded(&self) {
        self.added.write().await.clear();
    }

    /// Number of open_session / close_session calls so far.
    pub async fn session_counts(&self) -> (u32, u32) {
        (
            *self.sessions_opened.read().await,
            *self.sessions_closed.read().await,
        )
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: DownloadClientError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn clear_next_error(&self) {
        *self.next_error.write().await = None;
    }

    /// Set the progress for a torrent. Progress 1.0 moves the state to
    /// a seeding state so the completion predicate fires.
    pub async fn set_progress(&self, hash: &str, progress: f64) {
        let mut downloads = self.downloads.write().await;
        if let Some(download) = downloads.get_mut(hash) {
            let progress = progress.clamp(0.0, 1.0);
            download.info.progress = progress;
            download.info.state = if progress >= 1.0 {
                "stalledUP".to_string()
            } else {
                "downloading".to_string()
            };
        }
    }

    /// Set the client-native state string directly.
    pub async fn set_state(&self, hash: &str, state: &str) {
        let mut downloads = self.downloads.write().await;
        if let Some(download) = downloads.get_mut(hash) {
            download.info.state = state.to_string();
        }
    }

    /// Set the files reported for a torrent.
    pub async fn set_files(&self, hash: &str, files: Vec<RemoteFile>) {
        let mut downloads = self.downloads.write().await;
        if let Some(download) = downloads.get_mut(hash) {
            download.files = files;
        }
    }

    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.downloads.read().await.contains_key(hash)
    }

    pub async fn torrent_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    /// Pre-populate a download, bypassing add_magnet.
    pub async fn add_mock_download(&self, info: DownloadInfo) {
        let hash = info.hash.clone();
        self.downloads.write().await.insert(
            hash,
            MockDownload {
                info,
                files: Vec::new(),
            },
        );
    }

    async fn take_error(&self) -> Option<DownloadClientError> {
        self.next_error.write().await.take()
    }

    async fn generate_hash(&self) -> String {
        let mut counter = self.hash_counter.write().await;
        *counter += 1;
        format!("{:040x}", *counter)
    }
}

#[async_trait]
impl DownloadClient for MockDownloadClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open_session(&self) -> Result<(), DownloadClientError> {
        *self.sessions_opened.write().await += 1;
        Ok(())
    }

    async fn close_session(&self) -> Result<(), DownloadClientError> {
        *self.sessions_closed.write().await += 1;
        Ok(())
    }

    async fn add_magnet(
        &self,
        uri: &str,
        save_path: Option<&str>,
    ) -> Result<(), DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        self.added.write().await.push(RecordedAdd {
            uri: uri.to_string(),
            save_path: save_path.map(str::to_string),
            timestamp: Utc::now(),
        });

        let hash = match magnet::extract_hash(uri) {
            Some(hash) => hash,
            None => self.generate_hash().await,
        };
        let name = format!("Mock Download {}", &hash[..8]);

        self.downloads.write().await.insert(
            hash.clone(),
            MockDownload {
                info: DownloadInfo {
                    hash,
                    name,
                    state: "downloading".to_string(),
                    progress: 0.0,
                    save_path: save_path
                        .map(str::to_string)
                        .or_else(|| Some("/mock/downloads".to_string())),
                    size: 0,
                },
                files: Vec::new(),
            },
        );
        Ok(())
    }

    async fn exists(&self, hash: &str) -> Result<bool, DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self.downloads.read().await.contains_key(hash))
    }

    async fn info(&self, hash: &str) -> Result<Option<DownloadInfo>, DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self
            .downloads
            .read()
            .await
            .get(hash)
            .map(|download| download.info.clone()))
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<RemoteFile>, DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(self
            .downloads
            .read()
            .await
            .get(hash)
            .map(|download| download.files.clone())
            .unwrap_or_default())
    }

    async fn pause(&self, _hash: &str) -> Result<(), DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }

    async fn resume(&self, _hash: &str) -> Result<(), DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }

    async fn recheck(&self, _hash: &str) -> Result<(), DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }

    async fn delete(&self, hash: &str, _delete_files: bool) -> Result<(), DownloadClientError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        self.downloads.write().await.remove(hash);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "aaaabbbbccccddddeeeeffff0000111122223333";

    #[tokio::test]
    async fn test_add_magnet_registers_download() {
        let client = MockDownloadClient::new();
        client
            .add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH), None)
            .await
            .unwrap();

        assert!(client.exists(HASH).await.unwrap());
        assert_eq!(client.added_magnets().await.len(), 1);

        let info = client.info(HASH).await.unwrap().unwrap();
        assert_eq!(info.state, "downloading");
        assert_eq!(info.progress, 0.0);
    }

    #[tokio::test]
    async fn test_set_progress_completes_at_full() {
        let client = MockDownloadClient::new();
        client
            .add_magnet(&format!("magnet:?xt=urn:btih:{}", HASH), None)
            .await
            .unwrap();

        client.set_progress(HASH, 0.5).await;
        let info = client.info(HASH).await.unwrap().unwrap();
        assert!(!info.is_complete());

        client.set_progress(HASH, 1.0).await;
        let info = client.info(HASH).await.unwrap().unwrap();
        assert!(info.is_complete());
    }

    #[tokio::test]
    async fn test_next_error_fires_once() {
        let client = MockDownloadClient::new();
        client
            .set_next_error(DownloadClientError::Timeout)
            .await;

        assert!(client.exists(HASH).await.is_err());
        assert!(client.exists(HASH).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_files_for_unknown_hash_is_empty() {
        let client = MockDownloadClient::new();
        assert!(client.list_files(HASH).await.unwrap().is_empty());
    }
}
