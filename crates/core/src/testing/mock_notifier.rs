//! Mock notifier for testing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::notify::Notifier;

/// A delivered notification for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub title: String,
    pub message: String,
}

/// Mock implementation of the Notifier trait. Records every message and
/// succeeds or fails deterministically.
#[derive(Debug)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<SentNotification>>>,
    succeed: bool,
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNotifier {
    /// A notifier whose deliveries succeed.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            succeed: true,
        }
    }

    /// A notifier whose deliveries all fail.
    pub fn failing() -> Self {
        Self {
            succeed: false,
            ..Self::new()
        }
    }

    /// Handle to the sent log, kept alive independently of the notifier
    /// so assertions work after the notifier moved into a NotifierSet.
    pub fn sent_log(&self) -> Arc<RwLock<Vec<SentNotification>>> {
        Arc::clone(&self.sent)
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, title: &str, message: &str) -> bool {
        self.sent.write().await.push(SentNotification {
            title: title.to_string(),
            message: message.to_string(),
        });
        self.succeed
    }
}
