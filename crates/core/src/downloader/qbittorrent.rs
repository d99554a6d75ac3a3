//! qBittorrent download client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::DownloaderConfig;
use crate::metainfo::magnet;

use super::{DownloadClient, DownloadClientError, DownloadInfo, RemoteFile};

/// qBittorrent Web API client.
pub struct QbClient {
    client: Client,
    config: DownloaderConfig,
    /// Session marker (refreshed on auth failure). The actual SID cookie
    /// lives in the cookie jar.
    session: Arc<RwLock<Option<String>>>,
}

impl QbClient {
    pub fn new(config: DownloaderConfig) -> Self {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Base URL with any trailing slash removed.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and mark the session authenticated.
    async fn login(&self) -> Result<(), DownloadClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(DownloadClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(DownloadClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                truncate(&body)
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), DownloadClientError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        self.login().await
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, DownloadClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status.as_u16() == 403 {
            // Session expired, retry once after login
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(request_error)?;

            if !response.status().is_success() {
                return Err(DownloadClientError::ApiError(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            return response
                .text()
                .await
                .map_err(|e| DownloadClientError::ApiError(e.to_string()));
        }

        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadClientError::ApiError(e.to_string()))
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, DownloadClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if status.as_u16() == 403 {
            // Session expired, retry once after login
            warn!("qBittorrent session expired, re-authenticating");
            {
                let mut session = self.session.write().await;
                *session = None;
            }
            self.login().await?;

            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(request_error)?;

            if !response.status().is_success() {
                return Err(DownloadClientError::ApiError(format!(
                    "HTTP {}",
                    response.status()
                )));
            }

            return response
                .text()
                .await
                .map_err(|e| DownloadClientError::ApiError(e.to_string()));
        }

        if !status.is_success() {
            return Err(DownloadClientError::ApiError(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| DownloadClientError::ApiError(e.to_string()))
    }
}

/// qBittorrent torrent info response entry.
#[derive(Debug, Deserialize)]
struct QbTorrentEntry {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    #[serde(default)]
    save_path: Option<String>,
    #[serde(default)]
    size: i64,
}

impl QbTorrentEntry {
    fn into_download_info(self) -> DownloadInfo {
        DownloadInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: self.state,
            progress: self.progress,
            save_path: self.save_path.filter(|p| !p.is_empty()),
            size: self.size,
        }
    }
}

/// qBittorrent file list response entry. `name` is the path relative to
/// the torrent's save directory.
#[derive(Debug, Deserialize)]
struct QbFileEntry {
    name: String,
    #[serde(default)]
    size: i64,
}

impl QbFileEntry {
    fn into_remote_file(self) -> RemoteFile {
        let basename = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(self.name.as_str())
            .to_string();
        RemoteFile {
            name: basename,
            path: self.name,
            size: self.size,
        }
    }
}

/// Whether an add response body reports success. The client answers
/// duplicate adds inconsistently across versions, all of them are fine.
fn add_response_indicates_success(body: &str) -> bool {
    let lower = body.to_lowercase();
    body.contains("Ok.") || lower.contains("already") || lower.contains("exists")
}

/// Whether an error message means the torrent was already present.
fn error_indicates_duplicate(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already") || lower.contains("exists") || lower.contains("duplicate")
}

/// Classify a transport-level failure.
fn request_error(e: reqwest::Error) -> DownloadClientError {
    if e.is_timeout() {
        DownloadClientError::Timeout
    } else if e.is_connect() {
        DownloadClientError::ConnectionFailed(e.to_string())
    } else {
        DownloadClientError::ApiError(e.to_string())
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(100).collect()
}

#[async_trait]
impl DownloadClient for QbClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn open_session(&self) -> Result<(), DownloadClientError> {
        {
            let mut session = self.session.write().await;
            *session = None;
        }
        self.login().await
    }

    async fn close_session(&self) -> Result<(), DownloadClientError> {
        let had_session = {
            let session = self.session.read().await;
            session.is_some()
        };

        if had_session {
            let url = format!("{}/api/v2/auth/logout", self.base_url());
            if let Err(e) = self.client.post(&url).send().await {
                warn!(error = %e, "qBittorrent logout failed");
            }
        }

        let mut session = self.session.write().await;
        *session = None;
        Ok(())
    }

    async fn add_magnet(
        &self,
        uri: &str,
        save_path: Option<&str>,
    ) -> Result<(), DownloadClientError> {
        // A torrent the client already tracks makes the add a no-op.
        if let Some(hash) = magnet::extract_hash(uri) {
            if self.exists(&hash).await? {
                debug!(hash = %hash, "torrent already present, skipping add");
                return Ok(());
            }
        }

        let mut params: Vec<(&str, &str)> = vec![("urls", uri)];
        if let Some(path) = save_path {
            params.push(("savepath", path));
        }

        match self.post_form("/api/v2/torrents/add", &params).await {
            Ok(body) => {
                if add_response_indicates_success(&body) {
                    Ok(())
                } else {
                    Err(DownloadClientError::AddRejected(truncate(&body)))
                }
            }
            Err(e) if error_indicates_duplicate(&e.to_string()) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn exists(&self, hash: &str) -> Result<bool, DownloadClientError> {
        Ok(self.info(hash).await?.is_some())
    }

    async fn info(&self, hash: &str) -> Result<Option<DownloadInfo>, DownloadClientError> {
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash.to_lowercase());
        let body = self.get(&endpoint).await?;

        let entries: Vec<QbTorrentEntry> = serde_json::from_str(&body)
            .map_err(|e| DownloadClientError::ApiError(format!("Invalid JSON response: {}", e)))?;

        Ok(entries.into_iter().next().map(|e| e.into_download_info()))
    }

    async fn list_files(&self, hash: &str) -> Result<Vec<RemoteFile>, DownloadClientError> {
        let endpoint = format!("/api/v2/torrents/files?hash={}", hash.to_lowercase());
        let body = self.get(&endpoint).await?;

        let entries: Vec<QbFileEntry> = serde_json::from_str(&body)
            .map_err(|e| DownloadClientError::ApiError(format!("Invalid JSON response: {}", e)))?;

        Ok(entries.into_iter().map(|e| e.into_remote_file()).collect())
    }

    async fn pause(&self, hash: &str) -> Result<(), DownloadClientError> {
        self.post_form("/api/v2/torrents/pause", &[("hashes", hash)])
            .await?;
        Ok(())
    }

    async fn resume(&self, hash: &str) -> Result<(), DownloadClientError> {
        self.post_form("/api/v2/torrents/resume", &[("hashes", hash)])
            .await?;
        Ok(())
    }

    async fn recheck(&self, hash: &str) -> Result<(), DownloadClientError> {
        self.post_form("/api/v2/torrents/recheck", &[("hashes", hash)])
            .await?;
        Ok(())
    }

    async fn delete(&self, hash: &str, delete_files: bool) -> Result<(), DownloadClientError> {
        let delete_flag = if delete_files { "true" } else { "false" };
        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", hash), ("deleteFiles", delete_flag)],
        )
        .await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
