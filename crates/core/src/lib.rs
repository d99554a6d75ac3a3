pub mod classifier;
pub mod config;
pub mod downloader;
pub mod feed;
pub mod library;
pub mod metainfo;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod resolver;
pub mod store;
pub mod testing;

pub use classifier::{Classification, Classifier, LlmClient, OpenAiClient, Strategy, Verdict};
pub use config::{
    config_path_from_env, load_config, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use downloader::{DownloadClient, DownloadClientError, DownloadInfo, QbClient, RemoteFile};
pub use feed::{Feed, FeedError, FeedFetcher, FeedItem, HttpFeedFetcher};
pub use library::{Library, MaterializeError};
pub use metainfo::{magnet_from_torrent, FetchError, TorrentFetcher};
pub use notify::{Notifier, NotifierSet, TelegramNotifier, WebhookNotifier};
pub use pipeline::{Pipeline, PipelineDeps, PipelineError, PipelineStatus};
pub use resolver::{MetadataResolver, ResolverError, RqbitResolver};
pub use store::{
    FileDetails, FileKind, FileStore, HardlinkStatus, MediaFile, MediaType, NewMediaFile,
    NewSource, NewTorrent, Source, SourceKind, SourceStore, SqliteStore, StoreError, Torrent,
    TorrentStatus, TorrentStore,
};
