//! Telegram notification endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use super::Notifier;
use crate::config::TelegramConfig;

/// Sends messages through the Telegram Bot API.
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    fn format_text(title: &str, message: &str) -> String {
        format!("<b>{}</b>\n\n{}", title, message)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, title: &str, message: &str) -> bool {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payload = SendMessageRequest {
            chat_id: &self.chat_id,
            text: Self::format_text(title, message),
            parse_mode: "HTML",
        };

        // The URL embeds the bot token, so it never goes into the log.
        match self.client.post(&url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Telegram notification sent: {}", title);
                true
            }
            Ok(response) => {
                warn!(
                    "Telegram API returned {} for notification '{}'",
                    response.status(),
                    title
                );
                false
            }
            Err(e) => {
                warn!("Failed to send Telegram notification '{}': {}", title, e);
                false
            }
        }
    }
}
