//! Application configuration structures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::{DEFAULT_DEVICE_TIMEOUT, DEFAULT_FRESHNESS_WINDOW, DEFAULT_WORKERS};
use crate::snmp::{DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT, SessionPolicy};
use crate::storage::db::DEFAULT_MAX_CONNECTIONS;

use super::validation::{
    ConfigError, expand_env_vars, require_non_empty, require_non_zero, require_positive,
    require_sqlite_url,
};

// =============================================================================
// Constants
// =============================================================================

/// Default database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/portstat.db?mode=rwc";

/// Default SNMP community.
pub const DEFAULT_COMMUNITY: &str = "public";

/// Default log file.
pub const DEFAULT_LOG_FILE: &str = "portstat.log";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_freshness_window() -> Duration {
    DEFAULT_FRESHNESS_WINDOW
}

fn default_device_timeout() -> Duration {
    DEFAULT_DEVICE_TIMEOUT
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL. Supports `${VAR}` expansion.
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Connection pool size (default: 5).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

// =============================================================================
// SNMP Configuration
// =============================================================================

/// SNMP session configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    /// v2c community string. Supports `${VAR}` expansion.
    #[serde(default = "default_community")]
    pub community: String,

    /// Agent port for addresses without one (default: 161).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout (default: 5s).
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Retries after the first attempt (default: 3).
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            community: default_community(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        }
    }
}

impl std::fmt::Debug for SnmpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpConfig")
            .field("community", &"<redacted>")
            .field("port", &self.port)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish()
    }
}

// =============================================================================
// Collection Configuration
// =============================================================================

/// Run scheduling and concurrency configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Devices processed concurrently (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Devices sampled more recently than this are skipped (default: 1h).
    #[serde(default = "default_freshness_window", with = "humantime_serde")]
    pub freshness_window: Duration,

    /// Deadline for one device (default: 2m).
    #[serde(default = "default_device_timeout", with = "humantime_serde")]
    pub device_timeout: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append-only log file (default: `portstat.log`).
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// SNMP configuration.
    #[serde(default)]
    pub snmp: SnmpConfig,

    /// Collection configuration.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Load configuration, falling back to defaults when the file is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse, expand environment variables, and validate.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yaml::from_str(content)?;
        config.expand_env();
        config.validate()?;
        Ok(config)
    }

    fn expand_env(&mut self) {
        self.database.url = expand_env_vars(&self.database.url);
        self.snmp.community = expand_env_vars(&self.snmp.community);
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_sqlite_url(&self.database.url)?;
        require_positive(
            "database.max_connections",
            u64::from(self.database.max_connections),
        )?;

        require_non_empty("snmp.community", &self.snmp.community)?;
        require_positive("snmp.port", u64::from(self.snmp.port))?;
        require_non_zero("snmp.timeout", self.snmp.timeout)?;

        require_positive("collection.workers", self.collection.workers as u64)?;
        require_non_zero("collection.freshness_window", self.collection.freshness_window)?;
        require_non_zero("collection.device_timeout", self.collection.device_timeout)?;

        require_non_empty("logging.file", &self.logging.file.to_string_lossy())?;

        Ok(())
    }

    /// Session policy derived from the SNMP section.
    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy::new(self.snmp.community.clone())
            .with_timeout(self.snmp.timeout)
            .with_retries(self.snmp.retries)
            .with_port(self.snmp.port)
    }
}
