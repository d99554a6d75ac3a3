//! Outbound notifications for pipeline events.
//!
//! Delivery is best-effort: a notifier reports success or failure and
//! logs the details itself, but never propagates an error into the
//! pipeline. A lost notification must not stall an acquisition cycle.

mod telegram;
mod webhook;

pub use telegram::TelegramNotifier;
pub use webhook::WebhookNotifier;

use async_trait::async_trait;
use tracing::info;

use crate::config::NotifyConfig;

/// A single notification endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short identifier for logging.
    fn name(&self) -> &str;

    /// Deliver one message. Returns whether delivery succeeded.
    async fn send(&self, title: &str, message: &str) -> bool;
}

/// Fans one event out to every configured endpoint.
#[derive(Default)]
pub struct NotifierSet {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierSet {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    /// Build the set from config. Endpoints that are not configured are
    /// simply absent; an empty set swallows every event.
    pub fn from_config(config: &NotifyConfig) -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(telegram) = &config.telegram {
            notifiers.push(Box::new(TelegramNotifier::new(telegram)));
            info!("Telegram notifications enabled");
        }

        if let Some(webhook) = &config.webhook {
            notifiers.push(Box::new(WebhookNotifier::new(webhook)));
            info!("Webhook notifications enabled");
        }

        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Send to every endpoint concurrently, returning how many
    /// deliveries succeeded.
    pub async fn send_all(&self, title: &str, message: &str) -> usize {
        let sends: Vec<_> = self
            .notifiers
            .iter()
            .map(|notifier| notifier.send(title, message))
            .collect();

        futures::future::join_all(sends)
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }

    pub async fn notify_download_complete(&self, torrent_title: &str) {
        self.send_all(
            "Download complete",
            &format!("Torrent '{}' finished downloading", torrent_title),
        )
        .await;
    }

    pub async fn notify_download_failed(&self, torrent_title: &str, error: &str) {
        self.send_all(
            "Download failed",
            &format!("Torrent '{}' could not be downloaded.\nError: {}", torrent_title, error),
        )
        .await;
    }

    pub async fn notify_hardlink_created(&self, file_name: &str, hardlink_path: &str) {
        self.send_all(
            "Hardlink created",
            &format!("File '{}' is now in the library.\nPath: {}", file_name, hardlink_path),
        )
        .await;
    }
}
