//! Storage builder and handles.
//!
//! Provides a builder pattern for constructing the storage layer
//! and a handles struct for accessing all store facades.

use std::path::Path;

use crate::storage::StorageError;
use crate::storage::db::{DEFAULT_MAX_CONNECTIONS, SqlitePool};
use crate::storage::devices::DeviceStore;
use crate::storage::ports::PortStore;
use crate::storage::runs::RunStore;
use crate::storage::statistics::StatisticStore;

/// Builder for constructing the storage layer.
#[derive(Debug, Clone)]
pub struct StorageBuilder {
    url: String,
    max_connections: u32,
}

impl StorageBuilder {
    /// Create a new storage builder for a SQLite URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the maximum number of pooled connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Connect, migrate, and return handles to every store.
    pub async fn build(self) -> Result<StorageHandles, StorageError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = database_file(&self.url).and_then(Path::parent)
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePool::connect(&self.url, self.max_connections).await?;

        Ok(StorageHandles {
            devices: DeviceStore::new(pool.clone()),
            ports: PortStore::new(pool.clone()),
            statistics: StatisticStore::new(pool.clone()),
            runs: RunStore::new(pool.clone()),
            pool,
        })
    }
}

/// Handles to all storage layer facades.
#[derive(Debug, Clone)]
pub struct StorageHandles {
    /// Read-only device inventory.
    pub devices: DeviceStore,
    /// Port registry.
    pub ports: PortStore,
    /// Append-only statistics samples.
    pub statistics: StatisticStore,
    /// Collection run audit log.
    pub runs: RunStore,
    /// Shared connection pool.
    pub pool: SqlitePool,
}

impl StorageHandles {
    /// Close the connection pool.
    pub async fn shutdown(self) {
        self.pool.close().await;
    }
}

/// Extract the on-disk file path from a SQLite URL, if it names one.
fn database_file(url: &str) -> Option<&Path> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(':') || url.contains("mode=memory") {
        return None;
    }
    Some(Path::new(path))
}
