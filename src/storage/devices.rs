//! Read-only access to the external device inventory.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::storage::types::{Device, to_millis};

const DEVICE_COLUMNS: &str = "deviceid, ipaddress, device_name, type";

/// Inventory facade. Never writes.
#[derive(Debug, Clone)]
pub struct DeviceStore {
    pool: SqlitePool,
}

impl DeviceStore {
    /// Create a new device store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up one device by id.
    pub async fn get(&self, device_id: &str) -> Result<Option<Device>, StorageError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE deviceid = ?");
        let row = sqlx::query(&sql)
            .bind(device_id)
            .fetch_optional(self.pool.inner())
            .await?;

        row.as_ref().map(device_from_row).transpose()
    }

    /// List the whole inventory ordered by device id.
    pub async fn list_all(&self) -> Result<Vec<Device>, StorageError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY deviceid");
        let rows = sqlx::query(&sql).fetch_all(self.pool.inner()).await?;

        rows.iter().map(device_from_row).collect()
    }

    /// List devices with no statistics sample at or after `cutoff`.
    ///
    /// Devices that have never been sampled are included.
    pub async fn list_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<Device>, StorageError> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM devices
             WHERE deviceid NOT IN (
                 SELECT DISTINCT p.deviceid
                 FROM ports p
                 JOIN statistics s ON s.portid = p.id
                 WHERE s.time >= ?
             )
             ORDER BY deviceid"
        );
        let rows = sqlx::query(&sql)
            .bind(to_millis(cutoff))
            .fetch_all(self.pool.inner())
            .await?;

        rows.iter().map(device_from_row).collect()
    }
}

fn device_from_row(row: &SqliteRow) -> Result<Device, StorageError> {
    Ok(Device {
        id: row.try_get("deviceid")?,
        address: row.try_get("ipaddress")?,
        name: row.try_get("device_name")?,
        device_type: row.try_get("type")?,
    })
}
