//! Configuration module for portstat.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Database settings (SQLite URL, pool size)
//! - SNMP settings (community, port, timeout, retries)
//! - Collection settings (workers, freshness window, device deadline)
//! - Logging settings (log file)
//!
//! Command-line flags override file values; see the `portstat` binary.

mod app;
mod validation;

pub use app::{
    AppConfig, CollectionConfig, DEFAULT_COMMUNITY, DEFAULT_DATABASE_URL, DEFAULT_LOG_FILE,
    DatabaseConfig, LoggingConfig, SnmpConfig,
};
pub use validation::{ConfigError, expand_env_vars, parse_duration};
