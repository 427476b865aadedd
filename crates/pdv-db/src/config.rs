//! # Application Configuration
//!
//! Where the store lives and how it is opened.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     PDV_DATA_DIR=/srv/pdv                                               │
//! │     PDV_DB_PATH=/srv/pdv/loja.db                                        │
//! │     PDV_LOG=debug                                                       │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     $PDV_CONFIG, or                                                     │
//! │     ~/.config/pdv/pdv.toml (Linux)                                      │
//! │     %APPDATA%\snapdev\pdv\config\pdv.toml (Windows)                     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     %LOCALAPPDATA%\SnapDev PDV\database.db (Windows)                    │
//! │     ~/snapdev_pdv/database.db (elsewhere)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # pdv.toml
//! [storage]
//! data_dir = "/srv/pdv"
//! database_file = "database.db"
//! images_dir = "images"
//!
//! [database]
//! max_connections = 5
//! connect_timeout_secs = 30
//!
//! [logging]
//! filter = "info,pdv=debug,sqlx=warn"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

/// Configuration loading and saving errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("No config path available")]
    NoConfigPath,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Storage Settings
// =============================================================================

/// Folder name of the data directory on Windows, under `%LOCALAPPDATA%`.
const WINDOWS_DATA_DIR: &str = "SnapDev PDV";

/// Folder name of the data directory elsewhere, under the home directory.
const UNIX_DATA_DIR: &str = "snapdev_pdv";

/// Where the database file and product images are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Data directory. Unset means the platform default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Full database path. Overrides `data_dir`/`database_file` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Database file name inside the data directory.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Images folder name inside the data directory.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
}

fn default_database_file() -> String {
    "database.db".to_string()
}

fn default_images_dir() -> String {
    "images".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: None,
            database_path: None,
            database_file: default_database_file(),
            images_dir: default_images_dir(),
        }
    }
}

// =============================================================================
// Database Settings
// =============================================================================

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Logging Settings
// =============================================================================

/// Default `EnvFilter` directive.
pub const DEFAULT_LOG_FILTER: &str = "info,pdv=debug,sqlx=warn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` still wins.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            filter: default_log_filter(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `PDV_CONFIG`, or the platform path)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os("PDV_CONFIG").map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or(ConfigError::NoConfigPath)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.storage.database_file.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.database_file must not be empty".into(),
            ));
        }

        if self.storage.images_dir.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.images_dir must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("PDV_DATA_DIR") {
            debug!(data_dir = %dir, "Overriding data directory from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(path) = var("PDV_DB_PATH") {
            debug!(database_path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(filter) = var("PDV_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("br", "snapdev", "pdv")
            .map(|dirs| dirs.config_dir().join("pdv.toml"))
    }

    // =========================================================================
    // Resolved Paths
    // =========================================================================

    /// Data directory: configured, or the platform default.
    pub fn data_dir(&self) -> PathBuf {
        self.storage
            .data_dir
            .clone()
            .unwrap_or_else(default_data_dir)
    }

    /// Full path of the SQLite file.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| self.data_dir().join(&self.storage.database_file))
    }

    /// Directory product images are copied into.
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir().join(&self.storage.images_dir)
    }

    /// Creates the data and images directories.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.images_dir())?;
        if let Some(parent) = self.database_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

/// `%LOCALAPPDATA%\SnapDev PDV` on Windows, `~/snapdev_pdv` elsewhere.
pub fn default_data_dir() -> PathBuf {
    match directories::BaseDirs::new() {
        Some(dirs) if cfg!(windows) => dirs.data_local_dir().join(WINDOWS_DATA_DIR),
        Some(dirs) => dirs.home_dir().join(UNIX_DATA_DIR),
        None => PathBuf::from(UNIX_DATA_DIR),
    }
}
