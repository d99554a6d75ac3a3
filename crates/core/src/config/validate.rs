use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Downloader URL is an http(s) address and timeouts are non-zero
/// - Pipeline cycle interval is non-zero
/// - Library output dir, when set, is absolute
/// - Configured LLM and notification endpoints carry their credentials
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if !config.downloader.url.starts_with("http://") && !config.downloader.url.starts_with("https://")
    {
        return Err(ConfigError::ValidationError(format!(
            "downloader.url must be an http(s) URL, got {:?}",
            config.downloader.url
        )));
    }
    if config.downloader.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "downloader.timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.pipeline.cycle_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.cycle_interval_secs cannot be 0".to_string(),
        ));
    }

    if let Some(ref output_dir) = config.library.output_dir {
        if !output_dir.is_absolute() {
            return Err(ConfigError::ValidationError(format!(
                "library.output_dir must be absolute, got {}",
                output_dir.display()
            )));
        }
    }

    if config.resolver.enabled && config.resolver.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "resolver.timeout_secs cannot be 0".to_string(),
        ));
    }

    if let Some(ref llm) = config.llm {
        if llm.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.api_key cannot be empty".to_string(),
            ));
        }
    }

    if let Some(ref telegram) = config.notify.telegram {
        if telegram.bot_token.trim().is_empty() || telegram.chat_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "notify.telegram requires bot_token and chat_id".to_string(),
            ));
        }
    }

    if let Some(ref webhook) = config.notify.webhook {
        if !webhook.url.starts_with("http://") && !webhook.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "notify.webhook.url must be an http(s) URL, got {:?}",
                webhook.url
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, TelegramConfig, WebhookConfig};
    use std::path::PathBuf;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_bad_downloader_url() {
        let mut config = Config::default();
        config.downloader.url = "qbt:8080".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_zero_cycle_interval() {
        let mut config = Config::default();
        config.pipeline.cycle_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_relative_output_dir() {
        let mut config = Config::default();
        config.library.output_dir = Some(PathBuf::from("library"));
        assert!(validate_config(&config).is_err());

        config.library.output_dir = Some(PathBuf::from("/library"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_llm_requires_key() {
        let mut config = Config::default();
        config.llm = Some(LlmConfig {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key: "   ".to_string(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
        });
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_notify_endpoints() {
        let mut config = Config::default();
        config.notify.telegram = Some(TelegramConfig {
            bot_token: "".to_string(),
            chat_id: "42".to_string(),
        });
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.notify.webhook = Some(WebhookConfig {
            url: "ftp://example.com".to_string(),
        });
        assert!(validate_config(&config).is_err());
    }
}
