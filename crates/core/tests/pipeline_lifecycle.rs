//! Pipeline lifecycle integration tests.
//!
//! These tests drive full acquisition cycles against the real SQLite
//! store and mock external services:
//! - Running state management
//! - Feed discovery through download to cataloged, hardlinked files
//! - Magnet source ingestion and name resolution
//! - Failure isolation and the failed-torrent retry path

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tempfile::TempDir;

use gleaner_core::{
    classifier::Classifier,
    config::{LibraryConfig, PipelineConfig},
    downloader::DownloadClientError,
    feed::FeedError,
    library::Library,
    metainfo::TorrentFetcher,
    notify::NotifierSet,
    pipeline::{Pipeline, PipelineDeps},
    store::{
        FileKind, FileStore, HardlinkStatus, MediaFile, MediaType, NewSource, Source, SourceStore,
        SqliteStore, Torrent, TorrentStatus, TorrentStore,
    },
    testing::{
        fixtures, MockDownloadClient, MockFeedFetcher, MockNotifier, MockResolver,
        SentNotification,
    },
};

/// Test helper wiring a pipeline to mocks and temp directories.
struct TestHarness {
    pipeline: Pipeline,
    store: Arc<SqliteStore>,
    client: Arc<MockDownloadClient>,
    feeds: Arc<MockFeedFetcher>,
    resolver: Arc<MockResolver>,
    sent_log: Arc<tokio::sync::RwLock<Vec<SentNotification>>>,
    downloads: TempDir,
    output: TempDir,
    _temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let downloads = TempDir::new().expect("Failed to create downloads dir");
        let output = TempDir::new().expect("Failed to create output dir");
        let db_path = temp_dir.path().join("test.db");

        let store = Arc::new(SqliteStore::new(&db_path).expect("Failed to create store"));
        let client = Arc::new(MockDownloadClient::new());
        let feeds = Arc::new(MockFeedFetcher::new());
        let resolver = Arc::new(MockResolver::new());
        let notifier = MockNotifier::new();
        let sent_log = notifier.sent_log();

        let library_config = LibraryConfig {
            output_dir: Some(output.path().to_path_buf()),
            hardlink_enabled: true,
        };
        let library = Arc::new(Library::new(
            store.clone(),
            library_config,
            downloads.path().to_path_buf(),
        ));

        let metadata = Arc::new(
            TorrentFetcher::new(temp_dir.path().join("torrent-cache"), None)
                .expect("Failed to create torrent fetcher"),
        );

        let pipeline = Pipeline::new(
            PipelineConfig {
                cycle_interval_secs: 1,
            },
            PipelineDeps {
                sources: store.clone(),
                torrents: store.clone(),
                files: store.clone(),
                client: client.clone(),
                feeds: feeds.clone(),
                metadata,
                resolver: resolver.clone(),
                classifier: Arc::new(Classifier::rules_only()),
                library,
                notifier: Arc::new(NotifierSet::new(vec![Box::new(notifier)])),
            },
        );

        Self {
            pipeline,
            store,
            client,
            feeds,
            resolver,
            sent_log,
            downloads,
            output,
            _temp_dir: temp_dir,
        }
    }

    fn seed_source(&self, request: NewSource) -> Source {
        SourceStore::create(self.store.as_ref(), request).expect("Failed to create source")
    }

    /// A TV feed source together with its canned feed of magnet items.
    async fn seed_feed(&self, title: &str, entries: &[(&str, &str)]) -> Source {
        let url = format!(
            "https://feeds.example.com/{}.xml",
            title.to_lowercase().replace(' ', "-")
        );
        let source = self.seed_source(NewSource::feed(url.clone(), MediaType::Tv, title));
        self.feeds.set_feed(url, fixtures::magnet_feed(entries)).await;
        source
    }

    fn source(&self, id: i64) -> Source {
        SourceStore::get(self.store.as_ref(), id)
            .expect("Failed to read source")
            .expect("source not found")
    }

    fn torrent(&self, hash: &str) -> Torrent {
        self.store
            .get_by_hash(hash)
            .expect("Failed to read torrent")
            .expect("torrent not found")
    }

    fn files_for(&self, torrent_id: i64) -> Vec<MediaFile> {
        self.store
            .list_for_torrent(torrent_id)
            .expect("Failed to list files")
    }

    /// Make a feed source due again without waiting out its interval.
    fn rewind_last_check(&self, source_id: i64) {
        self.store
            .touch_last_check(source_id, Utc::now() - chrono::Duration::hours(2))
            .expect("Failed to rewind last_check");
    }

    fn write_download(&self, name: &str) {
        std::fs::write(self.downloads.path().join(name), b"payload")
            .expect("Failed to write download file");
    }

    async fn sent_notifications(&self) -> Vec<SentNotification> {
        self.sent_log.read().await.clone()
    }
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_pipeline_status_reflects_running_state() {
    let harness = TestHarness::new();

    assert!(
        !harness.pipeline.status().running,
        "Pipeline should not be running before start"
    );

    harness.pipeline.start().await;
    assert!(
        harness.pipeline.status().running,
        "Pipeline should be running after start"
    );

    harness.pipeline.stop().await;
    assert!(
        !harness.pipeline.status().running,
        "Pipeline should not be running after stop"
    );
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let harness = TestHarness::new();

    harness.pipeline.start().await;
    harness.pipeline.start().await;
    assert!(harness.pipeline.is_running());

    harness.pipeline.stop().await;
    assert!(!harness.pipeline.is_running());
}

#[tokio::test]
async fn test_stop_is_graceful() {
    let harness = TestHarness::new();

    harness.pipeline.start().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let stop_result = tokio::time::timeout(Duration::from_secs(5), harness.pipeline.stop()).await;
    assert!(
        stop_result.is_ok(),
        "Pipeline stop should complete within timeout"
    );
}

// =============================================================================
// Acquisition Cycle Tests
// =============================================================================

#[tokio::test]
async fn test_feed_item_discovered_and_submitted() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(4);
    let source = harness.seed_feed("Frieren", &[("Frieren - 04", &hash)]).await;

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.status, TorrentStatus::Downloading);
    assert_eq!(torrent.title.as_deref(), Some("Frieren - 04"));
    assert_eq!(torrent.source_id, source.id);

    assert!(harness.client.has_torrent(&hash).await);
    let added = harness.client.added_magnets().await;
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].uri, fixtures::magnet_uri(&hash));
    assert_eq!(added[0].save_path, None);

    assert!(
        harness.source(source.id).last_check.is_some(),
        "Feed check should stamp last_check"
    );

    let status = harness.pipeline.status();
    assert_eq!(status.downloading, 1);
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_known_hash_not_duplicated() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(4);
    let source = harness.seed_feed("Frieren", &[("Frieren - 04", &hash)]).await;

    harness.pipeline.run_once().await;
    harness.rewind_last_check(source.id);
    harness.pipeline.run_once().await;

    assert_eq!(harness.feeds.fetch_count().await, 2);
    let torrents = harness
        .store
        .list_for_source(source.id)
        .expect("Failed to list torrents");
    assert_eq!(torrents.len(), 1, "Same info hash must not create two rows");
    assert_eq!(harness.client.added_magnets().await.len(), 1);
}

#[tokio::test]
async fn test_feed_not_due_is_not_refetched() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(4);
    harness.seed_feed("Frieren", &[("Frieren - 04", &hash)]).await;

    harness.pipeline.run_once().await;
    harness.pipeline.run_once().await;

    assert_eq!(
        harness.feeds.fetch_count().await,
        1,
        "A freshly checked feed should wait out its interval"
    );
}

#[tokio::test]
async fn test_fetch_failure_retries_without_stamping() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(4);
    let source = harness.seed_feed("Frieren", &[("Frieren - 04", &hash)]).await;

    harness
        .feeds
        .set_next_error(FeedError::Request("connection refused".to_string()))
        .await;
    harness.pipeline.run_once().await;

    assert!(
        harness.source(source.id).last_check.is_none(),
        "A failed fetch must not stamp last_check"
    );
    assert!(harness.store.get_by_hash(&hash).expect("store").is_none());

    // The feed stays due, so the next cycle picks it up immediately.
    harness.pipeline.run_once().await;
    assert_eq!(harness.torrent(&hash).status, TorrentStatus::Downloading);
    assert!(harness.source(source.id).last_check.is_some());
}

#[tokio::test]
async fn test_completed_download_cataloged_and_linked() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(4);
    harness.seed_feed("Frieren", &[("Frieren - 04", &hash)]).await;

    harness.pipeline.run_once().await;

    harness.client.set_progress(&hash, 1.0).await;
    harness
        .client
        .set_files(
            &hash,
            vec![
                fixtures::video_file("Frieren - 04.mkv"),
                fixtures::remote_file("Frieren - 04 [CHS].srt", 64_000),
                fixtures::video_file("Frieren - 04 sample.mkv"),
                fixtures::remote_file("readme.txt", 100),
            ],
        )
        .await;
    harness.write_download("Frieren - 04.mkv");
    harness.write_download("Frieren - 04 [CHS].srt");

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.status, TorrentStatus::Completed);
    assert!(torrent.completed_at.is_some());

    let files = harness.files_for(torrent.id);
    assert_eq!(files.len(), 2, "Sample and readme files must be skipped");

    let episode = &files[0];
    assert_eq!(episode.kind, FileKind::Episode);
    assert_eq!(episode.final_episode, Some(4));
    assert_eq!(episode.hardlink_status, Some(HardlinkStatus::Completed));

    let subtitle = &files[1];
    assert_eq!(subtitle.kind, FileKind::Subtitle);
    assert_eq!(subtitle.final_episode, Some(4));
    assert_eq!(subtitle.hardlink_status, Some(HardlinkStatus::Completed));

    let episode_dest = harness
        .output
        .path()
        .join("Frieren/Season 1/Frieren S01E04.mkv");
    let subtitle_dest = harness
        .output
        .path()
        .join("Frieren/Season 1/Frieren S01E04.chs.srt");
    assert!(episode_dest.exists());
    assert!(subtitle_dest.exists());

    let sent = harness.sent_notifications().await;
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].title, "Download complete");
    assert!(sent[0].message.contains("Frieren - 04"));
    assert_eq!(sent[1].title, "Hardlink created");
    assert_eq!(sent[2].title, "Hardlink created");
}

#[tokio::test]
async fn test_special_cataloged_without_hardlink() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(9);
    harness.seed_feed("Frieren", &[("Frieren OVA", &hash)]).await;

    harness.pipeline.run_once().await;
    harness.client.set_progress(&hash, 1.0).await;
    harness
        .client
        .set_files(&hash, vec![fixtures::video_file("Frieren OVA 1.mkv")])
        .await;
    harness.write_download("Frieren OVA 1.mkv");
    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    let files = harness.files_for(torrent.id);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].kind, FileKind::Special);
    assert_eq!(files[0].final_episode, None);
    assert_eq!(files[0].hardlink_status, None, "Specials are not linked");

    let sent = harness.sent_notifications().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Download complete");
}

#[tokio::test]
async fn test_zero_file_torrents_retried() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(6);
    harness.seed_feed("Frieren", &[("Frieren - 06", &hash)]).await;

    harness.pipeline.run_once().await;
    harness.client.set_progress(&hash, 1.0).await;

    // The client reports no files yet; the torrent stays uncataloged.
    harness.pipeline.run_once().await;
    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.status, TorrentStatus::Completed);
    assert_eq!(harness.store.count_for_torrent(torrent.id).expect("count"), 0);

    harness
        .client
        .set_files(&hash, vec![fixtures::video_file("Frieren - 06.mkv")])
        .await;
    harness.write_download("Frieren - 06.mkv");

    harness.pipeline.run_once().await;
    assert_eq!(harness.store.count_for_torrent(torrent.id).expect("count"), 1);
}

#[tokio::test]
async fn test_episode_offset_applied() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(13);
    let url = "https://feeds.example.com/frieren-s2.xml".to_string();
    harness.seed_source(
        NewSource::feed(url.clone(), MediaType::Tv, "Frieren").with_episode_offset(-12),
    );
    harness
        .feeds
        .set_feed(url, fixtures::magnet_feed(&[("Frieren - 13", &hash)]))
        .await;

    harness.pipeline.run_once().await;
    harness.client.set_progress(&hash, 1.0).await;
    harness
        .client
        .set_files(&hash, vec![fixtures::video_file("Frieren - 13.mkv")])
        .await;
    harness.write_download("Frieren - 13.mkv");
    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    let files = harness.files_for(torrent.id);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].extracted_episode, Some(13));
    assert_eq!(files[0].final_episode, Some(1));

    assert!(harness
        .output
        .path()
        .join("Frieren/Season 1/Frieren S01E01.mkv")
        .exists());
}

#[tokio::test]
async fn test_movie_files_linked_flat() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(22);
    let url = "https://feeds.example.com/suzume.xml".to_string();
    harness.seed_source(NewSource::feed(url.clone(), MediaType::Movie, "Suzume"));
    harness
        .feeds
        .set_feed(url, fixtures::magnet_feed(&[("Suzume", &hash)]))
        .await;

    harness.pipeline.run_once().await;
    harness.client.set_progress(&hash, 1.0).await;
    harness
        .client
        .set_files(&hash, vec![fixtures::video_file("Suzume.2022.1080p.mkv")])
        .await;
    harness.write_download("Suzume.2022.1080p.mkv");
    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    let files = harness.files_for(torrent.id);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].kind, FileKind::Episode);
    assert_eq!(files[0].final_episode, None, "Movies have no episode number");

    assert!(harness.output.path().join("Suzume/Suzume.mkv").exists());
}

// =============================================================================
// Magnet Source Tests
// =============================================================================

#[tokio::test]
async fn test_magnet_source_uses_resolved_name() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(10);
    let uri = fixtures::magnet_uri(&hash);
    let source = harness.seed_source(NewSource::magnet(uri.clone(), MediaType::Tv, "Placeholder"));
    harness.resolver.set_name(uri.clone(), "Resolved Show S01").await;

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.title.as_deref(), Some("Resolved Show S01"));
    assert_eq!(torrent.status, TorrentStatus::Downloading);
    assert_eq!(harness.resolver.resolved_uris().await, vec![uri]);
    assert!(harness.source(source.id).last_check.is_some());
}

#[tokio::test]
async fn test_magnet_name_falls_back_to_dn() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(11);
    let uri = format!("{}&dn=Some%20Show%20S01", fixtures::magnet_uri(&hash));
    harness.seed_source(NewSource::magnet(uri, MediaType::Tv, "Placeholder"));

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.title.as_deref(), Some("Some Show S01"));
}

#[tokio::test]
async fn test_magnet_name_falls_back_to_source_title() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(12);
    harness.seed_source(NewSource::magnet(
        fixtures::magnet_uri(&hash),
        MediaType::Tv,
        "Named By Hand",
    ));

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.title.as_deref(), Some("Named By Hand"));
}

#[tokio::test]
async fn test_duplicate_magnet_source_skipped() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(16);
    let uri = fixtures::magnet_uri(&hash);
    let first = harness.seed_source(NewSource::magnet(uri.clone(), MediaType::Tv, "First"));
    let second = harness.seed_source(NewSource::magnet(uri, MediaType::Tv, "Second"));

    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.source_id, first.id);
    assert!(harness.source(first.id).last_check.is_some());
    assert!(
        harness.source(second.id).last_check.is_none(),
        "A skipped duplicate is not stamped"
    );
}

// =============================================================================
// Failure Handling Tests
// =============================================================================

#[tokio::test]
async fn test_rejected_add_marks_failed_and_notifies() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(5);
    harness.seed_feed("Frieren", &[("Frieren - 05", &hash)]).await;

    harness
        .client
        .set_next_error(DownloadClientError::AddRejected("no slots".to_string()))
        .await;
    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.status, TorrentStatus::Failed);
    assert!(torrent
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("no slots")));

    let sent = harness.sent_notifications().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].title, "Download failed");
    assert!(sent[0].message.contains("Frieren - 05"));
    assert!(sent[0].message.contains("no slots"));
}

#[tokio::test]
async fn test_failed_torrent_retried_and_recovers() {
    let harness = TestHarness::new();
    let hash = fixtures::hex_hash(5);
    harness.seed_feed("Frieren", &[("Frieren - 05", &hash)]).await;

    harness
        .client
        .set_next_error(DownloadClientError::Timeout)
        .await;
    harness.pipeline.run_once().await;
    assert_eq!(harness.torrent(&hash).status, TorrentStatus::Failed);

    // The error was consumed; the retry goes through.
    harness.pipeline.run_once().await;

    let torrent = harness.torrent(&hash);
    assert_eq!(torrent.status, TorrentStatus::Downloading);
    assert_eq!(torrent.error_message, None, "Recovery clears the error");
    assert_eq!(harness.client.added_magnets().await.len(), 1);
    assert!(harness.client.has_torrent(&hash).await);
}
