//! Append-only statistics samples.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::storage::types::{NewStatistic, StatisticSample, count_from_i64, from_millis, to_millis};

/// Statistics facade. Inserts only; rows are never updated or deleted.
#[derive(Debug, Clone)]
pub struct StatisticStore {
    pool: SqlitePool,
}

impl StatisticStore {
    /// Create a new statistics store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one sample and return its row id.
    pub async fn insert(&self, sample: &NewStatistic) -> Result<i64, StorageError> {
        let result = sqlx::query(
            "INSERT INTO statistics (portid, erroroid, interfaceerror, highspeedoid, ifhighspeed, time)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(sample.port_id)
        .bind(&sample.error_oid)
        .bind(sample.interface_errors)
        .bind(&sample.high_speed_oid)
        .bind(sample.high_speed)
        .bind(to_millis(sample.time))
        .execute(self.pool.inner())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Samples of one port, oldest first.
    pub async fn list_for_port(&self, port_id: i64) -> Result<Vec<StatisticSample>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, portid, erroroid, interfaceerror, highspeedoid, ifhighspeed, time
             FROM statistics WHERE portid = ? ORDER BY time, id",
        )
        .bind(port_id)
        .fetch_all(self.pool.inner())
        .await?;

        rows.iter().map(sample_from_row).collect()
    }

    /// Count all samples.
    pub async fn count(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM statistics")
            .fetch_one(self.pool.inner())
            .await?;
        count_from_i64(count, "count")
    }
}

fn sample_from_row(row: &SqliteRow) -> Result<StatisticSample, StorageError> {
    Ok(StatisticSample {
        id: row.try_get("id")?,
        port_id: row.try_get("portid")?,
        error_oid: row.try_get("erroroid")?,
        interface_errors: row.try_get("interfaceerror")?,
        high_speed_oid: row.try_get("highspeedoid")?,
        high_speed: row.try_get("ifhighspeed")?,
        time: from_millis(row.try_get("time")?)?,
    })
}
