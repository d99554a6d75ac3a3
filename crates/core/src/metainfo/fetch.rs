//! HTTP download of .torrent files with an on-disk cache.
//!
//! Cache entries are keyed by the md5 of the source URL. Entries expire
//! after [`CACHE_EXPIRY_SECS`] and the cache is pruned oldest-first when
//! it grows past [`MAX_CACHE_BYTES`].

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::magnet;
use super::torrent::{MetainfoError, Torrent};

/// Cached .torrent files are kept for 30 days.
pub const CACHE_EXPIRY_SECS: u64 = 30 * 24 * 3600;

/// Cache size cap before oldest entries are pruned.
pub const MAX_CACHE_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {0} fetching {1}")]
    Status(u16, String),

    #[error("downloaded data is not valid torrent metadata: {0}")]
    Invalid(#[from] MetainfoError),
}

/// Downloads torrent metadata over HTTP, consulting the disk cache first.
pub struct TorrentFetcher {
    client: reqwest::Client,
    cache_dir: PathBuf,
}

impl TorrentFetcher {
    pub fn new(cache_dir: impl Into<PathBuf>, proxy: Option<&str>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(30));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| FetchError::Client(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
        })
    }

    /// Fetches and validates torrent metadata for a URL.
    pub async fn fetch_metadata(&self, url: &str) -> Result<Torrent, FetchError> {
        let data = self.fetch_bytes(url).await?;
        Ok(Torrent::from_bytes(&data)?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(cached) = self.load_cached(url) {
            debug!(url, "torrent served from cache");
            return Ok(cached);
        }

        info!(url, "downloading torrent file");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16(), url.to_string()));
        }
        let data = response.bytes().await?.to_vec();

        // Only valid metadata goes into the cache.
        if Torrent::from_bytes(&data).is_ok() {
            self.store_cached(url, &data);
        }
        Ok(data)
    }

    fn cache_path(&self, url: &str) -> PathBuf {
        let digest = md5::compute(url.as_bytes());
        self.cache_dir.join(format!("{:x}.torrent", digest))
    }

    fn load_cached(&self, url: &str) -> Option<Vec<u8>> {
        let path = self.cache_path(url);
        if !is_fresh(&path) {
            return None;
        }
        std::fs::read(&path).ok()
    }

    fn store_cached(&self, url: &str, data: &[u8]) {
        if let Err(e) = std::fs::create_dir_all(&self.cache_dir) {
            warn!(error = %e, "cannot create torrent cache dir");
            return;
        }
        let path = self.cache_path(url);
        if let Err(e) = std::fs::write(&path, data) {
            warn!(error = %e, path = %path.display(), "cannot write torrent cache entry");
            return;
        }
        if let Err(e) = prune_cache(&self.cache_dir) {
            warn!(error = %e, "torrent cache prune failed");
        }
    }
}

/// Builds a magnet URI from already-fetched metadata, carrying the
/// display name and trackers over.
pub fn magnet_from_torrent(torrent: &Torrent) -> String {
    magnet::build(
        &torrent.info_hash(),
        Some(torrent.name()),
        &torrent.trackers(),
    )
}

fn is_fresh(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let Ok(modified) = meta.modified() else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age.as_secs() < CACHE_EXPIRY_SECS,
        Err(_) => true,
    }
}

fn prune_cache(dir: &Path) -> std::io::Result<()> {
    let mut entries = Vec::new();
    let mut total: u64 = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().map(|e| e != "torrent").unwrap_or(true) {
            continue;
        }
        let meta = entry.metadata()?;
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        entries.push((path, modified, meta.len()));
        total += meta.len();
    }

    let mut removed = 0usize;
    for (path, modified, size) in &entries {
        let expired = SystemTime::now()
            .duration_since(*modified)
            .map(|age| age.as_secs() >= CACHE_EXPIRY_SECS)
            .unwrap_or(false);
        if expired && std::fs::remove_file(path).is_ok() {
            total = total.saturating_sub(*size);
            removed += 1;
        }
    }

    if total > MAX_CACHE_BYTES {
        entries.sort_by_key(|(_, modified, _)| *modified);
        for (path, _, size) in &entries {
            if total <= MAX_CACHE_BYTES {
                break;
            }
            if std::fs::remove_file(path).is_ok() {
                total = total.saturating_sub(*size);
                removed += 1;
            }
        }
    }

    if removed > 0 {
        debug!(removed, "pruned torrent cache entries");
    }
    Ok(())
}
