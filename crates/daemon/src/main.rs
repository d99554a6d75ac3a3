use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gleaner_core::{
    config_path_from_env, load_config, validate_config, Classifier, DownloadClient, FeedFetcher,
    FileStore, HttpFeedFetcher, Library, LlmClient, MetadataResolver, NotifierSet, OpenAiClient,
    Pipeline, PipelineDeps, QbClient, RqbitResolver, SanitizedConfig, SourceStore, SqliteStore,
    TorrentFetcher, TorrentStore,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gleanerd v{}", VERSION);

    // Load configuration
    let config_path = config_path_from_env();
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Download directory: {:?}", config.general.download_dir);
    debug!(
        "Effective configuration: {:?}",
        SanitizedConfig::from(&config)
    );

    // Create the SQLite store, one connection shared by all three views
    let store =
        Arc::new(SqliteStore::new(&config.database.path).context("Failed to create store")?);
    let sources: Arc<dyn SourceStore> = store.clone();
    let torrents: Arc<dyn TorrentStore> = store.clone();
    let files: Arc<dyn FileStore> = store.clone();
    info!("Store initialized");

    // Create the download client
    info!("Initializing qBittorrent client at {}", config.downloader.url);
    let client: Arc<dyn DownloadClient> = Arc::new(QbClient::new(config.downloader.clone()));

    // Create the feed fetcher
    let proxy = config.general.proxy.as_deref();
    let feeds: Arc<dyn FeedFetcher> =
        Arc::new(HttpFeedFetcher::new(proxy).context("Failed to create feed fetcher")?);

    // Create the .torrent metadata fetcher
    let metadata = Arc::new(
        TorrentFetcher::new(config.general.cache_dir.clone(), proxy)
            .context("Failed to create torrent fetcher")?,
    );

    // Create the classifier, with LLM support when configured
    let classifier = match &config.llm {
        Some(llm_config) => {
            info!("Initializing LLM classifier (model: {})", llm_config.model);
            let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(llm_config));
            Arc::new(Classifier::new(Some(llm)))
        }
        None => {
            info!("No LLM configured, classifying by rules only");
            Arc::new(Classifier::rules_only())
        }
    };

    // Create the magnet name resolver
    if config.resolver.enabled {
        info!(
            "Magnet name resolver enabled (timeout: {}s)",
            config.resolver.timeout_secs
        );
    }
    let resolver: Arc<dyn MetadataResolver> =
        Arc::new(RqbitResolver::new(config.resolver.clone()));

    // Create the library materializer
    let library = Arc::new(Library::new(
        files.clone(),
        config.library.clone(),
        config.general.download_dir.clone(),
    ));

    // Create notification endpoints
    let notifier = Arc::new(NotifierSet::from_config(&config.notify));

    // Create and start the pipeline
    let pipeline = Pipeline::new(
        config.pipeline.clone(),
        PipelineDeps {
            sources,
            torrents,
            files,
            client,
            feeds,
            metadata,
            resolver,
            classifier,
            library,
            notifier,
        },
    );

    pipeline.start().await;
    info!("Acquisition pipeline started");

    // Run until asked to stop
    shutdown_signal().await;

    info!("Shutting down...");
    pipeline.stop().await;
    info!("Shutdown complete");

    Ok(())
}

/// Resolve once the process receives Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {},
        _ = terminate => {},
    }
}
