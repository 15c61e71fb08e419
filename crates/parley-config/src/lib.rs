pub mod config;
pub mod manager;

pub use config::{
    BackendConfig, Config, ConfigError, ConfigResult, LogLevel, LoggingConfig, SessionConfig,
    DEFAULT_BASE_URL,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// `~/.parley`
pub fn parley_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".parley"))
}

pub fn default_config_path() -> Option<PathBuf> {
    parley_dir().map(|dir| dir.join("config.json"))
}

pub fn default_token_path() -> Option<PathBuf> {
    parley_dir().map(|dir| dir.join("credentials").join("token.json"))
}

pub fn default_log_path() -> Option<PathBuf> {
    parley_dir().map(|dir| dir.join("logs").join("parley.log"))
}

/// Create the `~/.parley` directory layout
pub async fn init_parley_dirs() -> ConfigResult<()> {
    if let Some(parley) = parley_dir() {
        tokio::fs::create_dir_all(&parley).await?;
        tokio::fs::create_dir_all(parley.join("credentials")).await?;
        tokio::fs::create_dir_all(parley.join("logs")).await?;
    }
    Ok(())
}

/// Expand a leading `~/` to the home directory
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

impl SessionConfig {
    /// Resolved token file path, falling back to the default location
    pub fn resolved_token_path(&self) -> Option<PathBuf> {
        match &self.token_path {
            Some(path) => expand_tilde(path),
            None => default_token_path(),
        }
    }
}

impl LoggingConfig {
    pub fn resolved_file(&self) -> Option<PathBuf> {
        match &self.file {
            Some(path) => expand_tilde(path),
            None => default_log_path(),
        }
    }
}
