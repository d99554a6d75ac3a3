//! Generic webhook notification endpoint.
//!
//! Posts a small JSON body to a user-supplied URL. Useful for wiring
//! into chat bridges or automation tools without a dedicated client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use super::Notifier;
use crate::config::WebhookConfig;

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    title: &'a str,
    message: &'a str,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            url: config.url.clone(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, title: &str, message: &str) -> bool {
        let payload = WebhookPayload { title, message };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Webhook notification sent: {}", title);
                true
            }
            Ok(response) => {
                warn!(
                    "Webhook returned {} for notification '{}'",
                    response.status(),
                    title
                );
                false
            }
            Err(e) => {
                warn!("Failed to send webhook notification '{}': {}", title, e);
                false
            }
        }
    }
}
