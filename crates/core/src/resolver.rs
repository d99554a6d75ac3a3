//! Magnet metadata resolution through an embedded BitTorrent session.
//!
//! Magnet links without a display name only reveal their real torrent
//! name after talking to the swarm. That costs a DHT lookup, so the
//! whole capability sits behind a config flag and the pipeline falls
//! back to stored titles when it is off.

use std::time::Duration;

use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, AddTorrentResponse, Session};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ResolverConfig;

/// Errors that can occur while resolving magnet metadata.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Resolver is disabled")]
    Disabled,

    #[error("Session error: {0}")]
    Session(String),

    #[error("Failed to add magnet: {0}")]
    AddFailed(String),

    #[error("Timed out after {0}s waiting for torrent metadata")]
    Timeout(u64),
}

/// Resolves the real name behind a magnet URI.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Whether this resolver can be used at all.
    fn available(&self) -> bool;

    /// Fetch the torrent name for a magnet URI. `Ok(None)` means the
    /// swarm answered but no name was present.
    async fn resolve_name(&self, magnet: &str) -> Result<Option<String>, ResolverError>;
}

/// librqbit-backed resolver. Each call runs an ephemeral session that is
/// torn down as soon as the name is known; nothing is downloaded.
pub struct RqbitResolver {
    config: ResolverConfig,
}

impl RqbitResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MetadataResolver for RqbitResolver {
    fn available(&self) -> bool {
        self.config.enabled
    }

    async fn resolve_name(&self, magnet: &str) -> Result<Option<String>, ResolverError> {
        if !self.config.enabled {
            return Err(ResolverError::Disabled);
        }

        let session_dir = std::env::temp_dir().join("gleaner-resolver");
        std::fs::create_dir_all(&session_dir)
            .map_err(|e| ResolverError::Session(format!("Failed to create session dir: {}", e)))?;

        let session = Session::new(session_dir)
            .await
            .map_err(|e| ResolverError::Session(format!("Failed to start session: {}", e)))?;

        // The add future only completes once metadata has been fetched
        // from the swarm, which can take a while for rare torrents.
        let add_future = session.add_torrent(
            AddTorrent::from_url(magnet),
            Some(AddTorrentOptions {
                paused: true,
                ..Default::default()
            }),
        );

        let response = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            add_future,
        )
        .await
        .map_err(|_| ResolverError::Timeout(self.config.timeout_secs))?
        .map_err(|e| ResolverError::AddFailed(e.to_string()))?;

        let (id, name) = match response {
            AddTorrentResponse::Added(id, handle)
            | AddTorrentResponse::AlreadyManaged(id, handle) => {
                (id, handle.name().map(|s| s.to_string()))
            }
            AddTorrentResponse::ListOnly(_) => return Ok(None),
        };

        if let Err(e) = session.delete(id.into(), false).await {
            warn!(error = %e, "failed to remove resolver torrent");
        }

        debug!(magnet, name = ?name, "resolved magnet metadata");
        Ok(name)
    }
}
