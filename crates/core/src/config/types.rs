use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Paths and networking shared across components
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralConfig {
    /// Download client save directory, as visible to this process
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Cache directory for fetched .torrent files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Optional HTTP(S) proxy for outbound feed and metadata requests
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            cache_dir: default_cache_dir(),
            proxy: None,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("/downloads")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cache/gleaner")
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gleaner.db")
}

/// qBittorrent connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloaderConfig {
    /// Web UI base URL (e.g., "http://localhost:8080")
    #[serde(default = "default_downloader_url")]
    pub url: String,
    #[serde(default = "default_downloader_username")]
    pub username: String,
    #[serde(default = "default_downloader_password")]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            url: default_downloader_url(),
            username: default_downloader_username(),
            password: default_downloader_password(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_downloader_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_downloader_username() -> String {
    "admin".to_string()
}

fn default_downloader_password() -> String {
    "adminadmin".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Library layout and hardlink behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// Root of the organized library. Hardlinking is refused when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_hardlink_enabled")]
    pub hardlink_enabled: bool,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            hardlink_enabled: default_hardlink_enabled(),
        }
    }
}

fn default_hardlink_enabled() -> bool {
    true
}

/// Metadata resolution through an embedded bittorrent session
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Off by default; resolving names dials into the swarm.
    #[serde(default)]
    pub enabled: bool,
    /// Seconds to wait for metadata before giving up (default: 60)
    #[serde(default = "default_resolver_timeout")]
    pub timeout_secs: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timeout_secs: default_resolver_timeout(),
        }
    }
}

fn default_resolver_timeout() -> u64 {
    60
}

/// Scheduling of the acquisition cycle
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Seconds between cycles (default: 60)
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
        }
    }
}

fn default_cycle_interval() -> u64 {
    60
}

/// Language model access for file classification
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_api_url")]
    pub api_url: String,
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// Request timeout in seconds (default: 60)
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u32,
}

fn default_llm_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_llm_timeout() -> u32 {
    60
}

/// Notification endpoints. A configured endpoint is an enabled endpoint.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    pub url: String,
}

/// Sanitized config for logging and introspection (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub general: GeneralConfig,
    pub database: DatabaseConfig,
    pub downloader: SanitizedDownloaderConfig,
    pub library: LibraryConfig,
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<SanitizedLlmConfig>,
    pub notify: SanitizedNotifyConfig,
}

/// Sanitized downloader config (password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDownloaderConfig {
    pub url: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u32,
}

/// Sanitized language model config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub api_url: String,
    pub model: String,
    pub api_key_configured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedNotifyConfig {
    pub telegram_configured: bool,
    pub webhook_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            general: config.general.clone(),
            database: config.database.clone(),
            downloader: SanitizedDownloaderConfig {
                url: config.downloader.url.clone(),
                username: config.downloader.username.clone(),
                password_configured: !config.downloader.password.is_empty(),
                timeout_secs: config.downloader.timeout_secs,
            },
            library: config.library.clone(),
            resolver: config.resolver.clone(),
            pipeline: config.pipeline.clone(),
            llm: config.llm.as_ref().map(|llm| SanitizedLlmConfig {
                api_url: llm.api_url.clone(),
                model: llm.model.clone(),
                api_key_configured: !llm.api_key.is_empty(),
            }),
            notify: SanitizedNotifyConfig {
                telegram_configured: config.notify.telegram.is_some(),
                webhook_configured: config.notify.webhook.is_some(),
            },
        }
    }
}
