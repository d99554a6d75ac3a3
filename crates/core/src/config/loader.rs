use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};

use super::{types::Config, ConfigError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_VAR: &str = "GLEANER_CONFIG";

/// Prefix for environment overrides: `GLEANER_DOWNLOADER_URL` sets `downloader.url`.
const ENV_PREFIX: &str = "GLEANER_";

/// Resolve the config file path from `GLEANER_CONFIG`, falling back to
/// `config.toml` in the working directory.
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

/// Read configuration from a TOML file, then apply `GLEANER_`-prefixed
/// environment overrides on top of it.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parse configuration from a TOML string, without environment overrides.
pub fn load_config_from_str(raw: &str) -> Result<Config, ConfigError> {
    toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
}
