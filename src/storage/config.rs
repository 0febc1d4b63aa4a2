//! Application configuration.
//!
//! Loaded from `config.toml` in the platform data directory; a missing file
//! yields defaults. Remote credentials may also come from the environment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable overriding the remote backend URL.
pub const SUPABASE_URL_ENV: &str = "LIFTLOG_SUPABASE_URL";

/// Environment variable overriding the remote backend API key.
pub const SUPABASE_KEY_ENV: &str = "LIFTLOG_SUPABASE_KEY";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Local storage settings
    #[serde(default)]
    pub storage: StorageSettings,
    /// Remote sync settings
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            storage: StorageSettings::default(),
            sync: SyncSettings::default(),
        }
    }
}

impl AppConfig {
    /// Full path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.storage.database_file)
    }

    /// Apply environment overrides for remote credentials.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(SUPABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.sync.supabase_url = Some(url.trim().to_string());
            }
        }
        if let Ok(key) = std::env::var(SUPABASE_KEY_ENV) {
            if !key.trim().is_empty() {
                self.sync.anon_key = Some(key.trim().to_string());
            }
        }
    }
}

/// Local storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file name inside the data directory
    pub database_file: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_file: "liftlog.db".to_string(),
        }
    }
}

/// Remote sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the remote backend (e.g. `https://xyz.supabase.co`)
    pub supabase_url: Option<String>,
    /// Public API key sent with every request
    pub anon_key: Option<String>,
    /// First retry delay after a failed sync round
    pub retry_initial_ms: u64,
    /// Upper bound of the retry delay
    pub retry_max_ms: u64,
    /// Interval between remote polls while idle
    pub realtime_poll_ms: u64,
    /// Maximum rows per upsert request
    pub push_batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            supabase_url: None,
            anon_key: None,
            retry_initial_ms: 1_000,
            retry_max_ms: 60_000,
            realtime_poll_ms: 15_000,
            push_batch_size: 50,
        }
    }
}

impl SyncSettings {
    /// Whether remote credentials are configured.
    pub fn is_configured(&self) -> bool {
        self.supabase_url.is_some() && self.anon_key.is_some()
    }

    /// Next retry delay after `current`, doubled and capped.
    pub fn next_backoff(&self, current_ms: u64) -> u64 {
        let max = self.retry_max_ms.max(1);
        let min = self.retry_initial_ms.max(1).min(max);
        current_ms.saturating_mul(2).clamp(min, max)
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "liftlog", "LiftLog")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path();

    let mut config = if path.exists() {
        let content =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        parse_config(&content)?
    } else {
        AppConfig::default()
    };

    config.data_dir = get_data_dir();
    config.apply_env_overrides();

    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
