//! Configuration management
//!
//! Defaults, TOML files and `DIPCHAT_*` environment overrides.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// SQLite store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; created on first open
    pub db_path: PathBuf,

    /// Maximum pooled connections
    pub pool_size: u32,

    /// How long a writer waits on a locked database before giving up
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

/// Chat service tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Upper bound on in-flight per-channel count queries for one listing
    pub count_concurrency: usize,

    /// Longest accepted message body, in characters
    pub max_body_len: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub json_format: bool,
    pub with_timestamp: bool,
    pub with_target: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/dipchat.db"),
            pool_size: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            count_concurrency: 16,
            max_body_len: 4096,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Variables follow the pattern `DIPCHAT_<SECTION>_<KEY>`, for example
    /// `DIPCHAT_STORE_DB_PATH=/var/lib/dipchat/chat.db`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay any `DIPCHAT_*` variables onto this configuration
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(path) = env::var("DIPCHAT_STORE_DB_PATH") {
            self.store.db_path = PathBuf::from(path);
        }
        if let Some(size) = parse_env("DIPCHAT_STORE_POOL_SIZE")? {
            self.store.pool_size = size;
        }
        if let Ok(raw) = env::var("DIPCHAT_STORE_BUSY_TIMEOUT") {
            self.store.busy_timeout = humantime_serde::re::humantime::parse_duration(&raw)
                .map_err(|e| ConfigError::InvalidValue {
                    key: "DIPCHAT_STORE_BUSY_TIMEOUT".to_string(),
                    message: e.to_string(),
                })?;
        }

        if let Some(limit) = parse_env("DIPCHAT_CHAT_COUNT_CONCURRENCY")? {
            self.chat.count_concurrency = limit;
        }
        if let Some(len) = parse_env("DIPCHAT_CHAT_MAX_BODY_LEN")? {
            self.chat.max_body_len = len;
        }

        if let Ok(level) = env::var("DIPCHAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("DIPCHAT_LOG_JSON")? {
            self.logging.json_format = json;
        }

        Ok(())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        if self.store.db_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("db_path must not be empty".to_string()));
        }

        if self.chat.count_concurrency == 0 {
            return Err(ConfigError::ValidationFailed(
                "count_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.chat.max_body_len == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_body_len must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = self.logging.level.parse::<LogLevel>() {
            return Err(ConfigError::ValidationFailed(e.to_string()));
        }

        Ok(())
    }

    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}
