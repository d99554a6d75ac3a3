//! Acquisition pipeline implementation.
//!
//! Drives every source through the torrent state machine in cycles of
//! five ordered phases:
//! - Feed check: poll due feeds, register new torrents as pending
//! - Magnet check: ingest magnet sources that have no torrent yet
//! - Submit: hand pending and failed torrents to the download client
//! - Progress: poll downloading torrents, promote finished ones
//! - Process: classify files of completed torrents, hardlink keepers
//!
//! Every phase is per-item isolated: one bad feed, torrent or file is
//! logged and skipped, the rest of the cycle goes on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::classifier::{is_subtitle_file, Classifier};
use crate::config::PipelineConfig;
use crate::downloader::{DownloadClient, RemoteFile};
use crate::feed::{FeedFetcher, FeedItem};
use crate::library::Library;
use crate::metainfo::{magnet, magnet_from_torrent, TorrentFetcher};
use crate::metrics::{
    CYCLES_RUN, CYCLE_DURATION, FEED_FETCHES, TORRENTS_ADDED, TORRENTS_COMPLETED,
    TORRENTS_DISCOVERED, TORRENTS_FAILED,
};
use crate::notify::NotifierSet;
use crate::resolver::MetadataResolver;
use crate::store::{
    FileKind, FileStore, MediaType, NewMediaFile, NewTorrent, Source, SourceStore, Torrent,
    TorrentStatus, TorrentStore,
};

use super::error::PipelineError;

/// Everything a cycle needs to run. Built once by the daemon and shared
/// with the cycle task.
pub struct PipelineDeps {
    pub sources: Arc<dyn SourceStore>,
    pub torrents: Arc<dyn TorrentStore>,
    pub files: Arc<dyn FileStore>,
    pub client: Arc<dyn DownloadClient>,
    pub feeds: Arc<dyn FeedFetcher>,
    pub metadata: Arc<TorrentFetcher>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub classifier: Arc<Classifier>,
    pub library: Arc<Library>,
    pub notifier: Arc<NotifierSet>,
}

/// Snapshot of pipeline state for status endpoints and logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub running: bool,
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
}

/// The acquisition pipeline. Owns the cycle loop.
pub struct Pipeline {
    config: PipelineConfig,
    deps: Arc<PipelineDeps>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, deps: PipelineDeps) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            deps: Arc::new(deps),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Start the cycle loop. Idempotent.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Pipeline already running");
            return;
        }

        info!(
            interval_secs = self.config.cycle_interval_secs,
            "Starting acquisition pipeline"
        );
        self.spawn_cycle_loop();
    }

    /// Stop the cycle loop gracefully.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Pipeline not running");
            return;
        }

        info!("Stopping acquisition pipeline");
        let _ = self.shutdown_tx.send(());

        // Give the cycle task a moment to finish the in-flight item
        tokio::time::sleep(Duration::from_millis(500)).await;

        info!("Acquisition pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Run a single cycle immediately, outside the loop. Used by the
    /// manual trigger surface and by tests.
    pub async fn run_once(&self) {
        Self::run_cycle(&self.deps).await;
    }

    /// Current torrent counts per state.
    pub fn status(&self) -> PipelineStatus {
        let count = |status: TorrentStatus| {
            self.deps
                .torrents
                .list_by_status(status)
                .map(|torrents| torrents.len())
                .unwrap_or(0)
        };

        PipelineStatus {
            running: self.is_running(),
            pending: count(TorrentStatus::Pending),
            downloading: count(TorrentStatus::Downloading),
            completed: count(TorrentStatus::Completed),
            failed: count(TorrentStatus::Failed),
        }
    }

    fn spawn_cycle_loop(&self) {
        let deps = Arc::clone(&self.deps);
        let running = Arc::clone(&self.running);
        let interval = Duration::from_secs(self.config.cycle_interval_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Cycle loop started");
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                Self::run_cycle(&deps).await;

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cycle loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Cycle loop stopped");
        });
    }

    async fn run_cycle(deps: &PipelineDeps) {
        debug!("Starting acquisition cycle");
        let timer = CYCLE_DURATION.start_timer();

        if let Err(e) = Self::check_feeds(deps).await {
            warn!("Feed check phase failed: {}", e);
        }
        if let Err(e) = Self::check_magnet_sources(deps).await {
            warn!("Magnet check phase failed: {}", e);
        }
        if let Err(e) = Self::submit_pending(deps).await {
            warn!("Submit phase failed: {}", e);
        }
        if let Err(e) = Self::refresh_progress(deps).await {
            warn!("Progress phase failed: {}", e);
        }
        if let Err(e) = Self::process_completed(deps).await {
            warn!("Completed-torrent phase failed: {}", e);
        }

        CYCLES_RUN.inc();
        timer.observe_duration();
        debug!("Acquisition cycle finished");
    }

    // ========================================================================
    // Phase 1: feed check
    // ========================================================================

    async fn check_feeds(deps: &PipelineDeps) -> Result<(), PipelineError> {
        let due = deps.sources.feeds_due(Utc::now())?;
        if due.is_empty() {
            return Ok(());
        }

        info!("Checking {} due feed sources", due.len());
        for source in &due {
            if let Err(e) = Self::check_one_feed(deps, source).await {
                warn!(
                    "Error checking feed source {} ({}): {}",
                    source.id, source.title, e
                );
            }
        }
        Ok(())
    }

    async fn check_one_feed(deps: &PipelineDeps, source: &Source) -> Result<(), PipelineError> {
        let feed = match deps.feeds.fetch(&source.url).await {
            Ok(feed) => {
                FEED_FETCHES.with_label_values(&["success"]).inc();
                feed
            }
            Err(e) => {
                // No last_check stamp here, a transient failure retries
                // next cycle instead of waiting out the interval.
                FEED_FETCHES.with_label_values(&["error"]).inc();
                return Err(e.into());
            }
        };

        debug!(
            source_id = source.id,
            items = feed.items.len(),
            "fetched feed"
        );

        for item in &feed.items {
            if let Err(e) = Self::ingest_feed_item(deps, source, item).await {
                warn!(
                    "Error ingesting item {:?} from feed {}: {}",
                    item.title, source.title, e
                );
            }
        }

        deps.sources.touch_last_check(source.id, Utc::now())?;
        Ok(())
    }

    async fn ingest_feed_item(
        deps: &PipelineDeps,
        source: &Source,
        item: &FeedItem,
    ) -> Result<(), PipelineError> {
        let Some(download_url) = item.download_url() else {
            return Ok(());
        };

        let (magnet_url, metadata_name) = if download_url.starts_with("magnet:") {
            let name = magnet::parse(&download_url)
                .ok()
                .and_then(|info| info.display_name);
            (download_url, name)
        } else {
            // A .torrent enclosure: download (cache-first), convert.
            let torrent = deps.metadata.fetch_metadata(&download_url).await?;
            let name = Some(torrent.name().to_string());
            (magnet_from_torrent(&torrent), name)
        };

        let Some(hash) = magnet::extract_hash(&magnet_url) else {
            warn!("Cannot extract info hash from {}", magnet_url);
            return Ok(());
        };

        if deps.torrents.hash_exists(&hash)? {
            return Ok(());
        }

        let title = item
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .or(metadata_name)
            .unwrap_or_else(|| format!("Magnet Torrent {}", &hash[..8]));

        let torrent = deps.torrents.create(NewTorrent {
            hash,
            source_id: source.id,
            url: magnet_url,
            title: Some(title),
        })?;
        TORRENTS_DISCOVERED.inc();
        info!(
            "Discovered torrent {} from feed {}",
            torrent.hash, source.title
        );
        Ok(())
    }

    // ========================================================================
    // Phase 2: magnet check
    // ========================================================================

    async fn check_magnet_sources(deps: &PipelineDeps) -> Result<(), PipelineError> {
        let sources = deps.sources.magnets_without_torrent()?;
        for source in &sources {
            if let Err(e) = Self::ingest_magnet_source(deps, source).await {
                warn!(
                    "Error processing magnet source {} ({}): {}",
                    source.id, source.title, e
                );
            }
        }
        Ok(())
    }

    async fn ingest_magnet_source(
        deps: &PipelineDeps,
        source: &Source,
    ) -> Result<(), PipelineError> {
        if !magnet::is_valid(&source.url) {
            warn!("Magnet source {} has an invalid magnet URI", source.id);
            return Ok(());
        }

        let Some(hash) = magnet::extract_hash(&source.url) else {
            warn!("Cannot extract info hash from magnet source {}", source.id);
            return Ok(());
        };

        if deps.torrents.hash_exists(&hash)? {
            info!(
                "Torrent {} already tracked, skipping magnet source {}",
                hash, source.id
            );
            return Ok(());
        }

        let title = Self::resolve_magnet_title(deps, source, &hash).await;

        deps.torrents.create(NewTorrent {
            hash: hash.clone(),
            source_id: source.id,
            url: source.url.clone(),
            title: Some(title),
        })?;
        TORRENTS_DISCOVERED.inc();
        info!(
            "Created torrent {} from magnet source {}",
            hash, source.id
        );

        deps.sources.touch_last_check(source.id, Utc::now())?;
        Ok(())
    }

    /// Best display name for a magnet torrent: swarm metadata when the
    /// resolver is on, then the `dn` parameter, then the source title.
    async fn resolve_magnet_title(deps: &PipelineDeps, source: &Source, hash: &str) -> String {
        let mut resolved = None;
        if deps.resolver.available() {
            match deps.resolver.resolve_name(&source.url).await {
                Ok(name) => resolved = name,
                Err(e) => warn!(
                    "Name resolution failed for magnet source {}: {}",
                    source.id, e
                ),
            }
        }

        resolved
            .or_else(|| {
                magnet::parse(&source.url)
                    .ok()
                    .and_then(|info| info.display_name)
            })
            .or_else(|| {
                let title = source.title.trim();
                (!title.is_empty()).then(|| title.to_string())
            })
            .unwrap_or_else(|| format!("Magnet Torrent {}", &hash[..8]))
    }

    // ========================================================================
    // Phase 3: submit pending and failed torrents
    // ========================================================================

    async fn submit_pending(deps: &PipelineDeps) -> Result<(), PipelineError> {
        let mut batch = deps.torrents.list_by_status(TorrentStatus::Pending)?;
        batch.extend(deps.torrents.list_by_status(TorrentStatus::Failed)?);
        if batch.is_empty() {
            return Ok(());
        }

        info!("Submitting {} pending/failed torrents", batch.len());
        deps.client.open_session().await?;

        for torrent in &batch {
            if let Err(e) = Self::submit_one(deps, torrent).await {
                warn!("Error submitting torrent {}: {}", torrent.hash, e);
            }
        }

        if let Err(e) = deps.client.close_session().await {
            warn!("Error closing download client session: {}", e);
        }
        Ok(())
    }

    async fn submit_one(deps: &PipelineDeps, torrent: &Torrent) -> Result<(), PipelineError> {
        if torrent.status == TorrentStatus::Failed {
            info!("Retrying failed torrent: {}", torrent.hash);
            deps.torrents
                .set_status(torrent.id, TorrentStatus::Pending, None)?;
        }

        match Self::ensure_in_client(deps, torrent).await {
            Ok(already_known) => {
                deps.torrents
                    .set_status(torrent.id, TorrentStatus::Downloading, None)?;
                if already_known {
                    info!(
                        "Torrent already known to the download client: {}",
                        torrent.hash
                    );
                } else {
                    TORRENTS_ADDED.inc();
                    info!("Added torrent to download client: {}", torrent.hash);
                }
            }
            Err(e) => {
                let message = e.to_string();
                deps.torrents
                    .set_status(torrent.id, TorrentStatus::Failed, Some(&message))?;
                TORRENTS_FAILED.inc();
                error!("Failed to add torrent {}: {}", torrent.hash, message);
                deps.notifier
                    .notify_download_failed(torrent.display_title(), &message)
                    .await;
            }
        }
        Ok(())
    }

    /// Returns whether the torrent was already present in the client.
    async fn ensure_in_client(
        deps: &PipelineDeps,
        torrent: &Torrent,
    ) -> Result<bool, crate::downloader::DownloadClientError> {
        if deps.client.exists(&torrent.hash).await? {
            return Ok(true);
        }
        deps.client.add_magnet(&torrent.url, None).await?;
        Ok(false)
    }

    // ========================================================================
    // Phase 4: refresh download progress
    // ========================================================================

    async fn refresh_progress(deps: &PipelineDeps) -> Result<(), PipelineError> {
        let downloading = deps.torrents.list_by_status(TorrentStatus::Downloading)?;
        if downloading.is_empty() {
            return Ok(());
        }

        debug!(
            "Refreshing progress for {} downloading torrents",
            downloading.len()
        );
        deps.client.open_session().await?;

        for torrent in &downloading {
            if let Err(e) = Self::refresh_one(deps, torrent).await {
                warn!(
                    "Error updating progress for torrent {}: {}",
                    torrent.hash, e
                );
            }
        }

        if let Err(e) = deps.client.close_session().await {
            warn!("Error closing download client session: {}", e);
        }
        Ok(())
    }

    async fn refresh_one(deps: &PipelineDeps, torrent: &Torrent) -> Result<(), PipelineError> {
        let Some(info) = deps.client.info(&torrent.hash).await? else {
            // Client lost it, maybe removed manually. Leave the row as
            // is so a re-add can pick it up again.
            debug!("Torrent {} not reported by the download client", torrent.hash);
            return Ok(());
        };

        deps.torrents.set_progress(torrent.id, info.progress)?;

        if info.is_complete() {
            deps.torrents
                .set_status(torrent.id, TorrentStatus::Completed, None)?;
            TORRENTS_COMPLETED.inc();
            info!("Torrent completed: {}", torrent.hash);
            deps.notifier
                .notify_download_complete(torrent.display_title())
                .await;
        }
        Ok(())
    }

    // ========================================================================
    // Phase 5: classify and catalog files of completed torrents
    // ========================================================================

    async fn process_completed(deps: &PipelineDeps) -> Result<(), PipelineError> {
        let completed = deps.torrents.completed_without_files()?;
        if completed.is_empty() {
            return Ok(());
        }

        info!("Processing files for {} completed torrents", completed.len());
        deps.client.open_session().await?;

        for torrent in &completed {
            if let Err(e) = Self::catalog_torrent_files(deps, torrent).await {
                error!(
                    "Error processing files for torrent {}: {}",
                    torrent.hash, e
                );
            }
        }

        if let Err(e) = deps.client.close_session().await {
            warn!("Error closing download client session: {}", e);
        }
        Ok(())
    }

    async fn catalog_torrent_files(
        deps: &PipelineDeps,
        torrent: &Torrent,
    ) -> Result<(), PipelineError> {
        let files = deps.client.list_files(&torrent.hash).await?;
        if files.is_empty() {
            // Retried next cycle; the client sometimes needs a moment
            // after completion before it reports content files.
            debug!("No files reported yet for torrent {}", torrent.hash);
            return Ok(());
        }

        let Some(source) = deps.sources.get(torrent.source_id)? else {
            warn!(
                "Torrent {} references missing source {}",
                torrent.hash, torrent.source_id
            );
            return Ok(());
        };

        for file in &files {
            if let Err(e) = Self::catalog_one_file(deps, &source, torrent, file).await {
                warn!(
                    "Error cataloging file {} of torrent {}: {}",
                    file.name, torrent.hash, e
                );
            }
        }
        Ok(())
    }

    async fn catalog_one_file(
        deps: &PipelineDeps,
        source: &Source,
        torrent: &Torrent,
        file: &RemoteFile,
    ) -> Result<(), PipelineError> {
        let verdict = deps.classifier.classify(&file.name).await;
        let classification = verdict.value;

        if !classification.important {
            debug!(
                file = %file.name,
                strategy = verdict.strategy.as_str(),
                "skipping unimportant file"
            );
            return Ok(());
        }

        let kind = if is_subtitle_file(&file.name) {
            FileKind::Subtitle
        } else if !classification.video {
            FileKind::Other
        } else if classification.main_episode {
            FileKind::Episode
        } else {
            FileKind::Special
        };

        let mut extracted_episode = None;
        let mut final_episode = None;
        if source.media_type == MediaType::Tv
            && (classification.main_episode || kind == FileKind::Subtitle)
        {
            let episode = deps.classifier.extract_episode(source, &file.name).await;
            if let Some(number) = episode.value {
                extracted_episode = Some(number);
                final_episode = Some(number + source.episode_offset);
            } else {
                debug!(
                    file = %file.name,
                    strategy = episode.strategy.as_str(),
                    "no episode number found"
                );
            }
        }

        let record = deps.files.create(NewMediaFile {
            torrent_id: torrent.id,
            name: file.name.clone(),
            path: file.path.clone(),
            size: file.size,
            kind,
            extracted_episode,
            final_episode,
        })?;
        info!(
            file = %record.name,
            kind = %record.kind,
            episode = ?record.final_episode,
            "cataloged file"
        );

        let wants_link = deps.library.hardlink_enabled()
            && (classification.video || kind == FileKind::Subtitle)
            && classification.main_episode;
        if wants_link {
            match deps.library.materialize(source, &record, false).await {
                Ok(dest) => {
                    deps.notifier
                        .notify_hardlink_created(&record.name, &dest.to_string_lossy())
                        .await;
                }
                Err(e) => {
                    // Already recorded on the file row by the library.
                    warn!("Hardlink failed for {}: {}", record.name, e);
                }
            }
        }

        Ok(())
    }
}
