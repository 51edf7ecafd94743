//! Collection run audit log (`collection_logs`).

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::storage::types::{CollectionRun, count_from_i64, counter_to_i64, from_millis, to_millis};

/// Run log facade.
#[derive(Debug, Clone)]
pub struct RunStore {
    pool: SqlitePool,
}

impl RunStore {
    /// Create a new run store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a run record and return its id.
    pub async fn insert(&self, run: &CollectionRun) -> Result<i64, StorageError> {
        let options = serde_json::to_string(&run.options)?;

        let result = sqlx::query(
            "INSERT INTO collection_logs (
                 start_time, duration, devices_processed, ports_updated,
                 statistics_collected, errors, options
             ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(to_millis(run.start_time))
        .bind(run.duration_secs)
        .bind(counter_to_i64(run.devices_processed))
        .bind(counter_to_i64(run.ports_updated))
        .bind(counter_to_i64(run.statistics_collected))
        .bind(counter_to_i64(run.errors))
        .bind(options)
        .execute(self.pool.inner())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent runs, newest first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<CollectionRun>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, start_time, duration, devices_processed, ports_updated,
                    statistics_collected, errors, options
             FROM collection_logs ORDER BY start_time DESC, id DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool.inner())
        .await?;

        rows.iter().map(run_from_row).collect()
    }

    /// Count all run records.
    pub async fn count(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM collection_logs")
            .fetch_one(self.pool.inner())
            .await?;
        count_from_i64(count, "count")
    }
}

fn run_from_row(row: &SqliteRow) -> Result<CollectionRun, StorageError> {
    let options: String = row.try_get("options")?;

    Ok(CollectionRun {
        id: Some(row.try_get("id")?),
        start_time: from_millis(row.try_get("start_time")?)?,
        duration_secs: row.try_get("duration")?,
        devices_processed: count_from_i64(row.try_get("devices_processed")?, "devices_processed")?,
        ports_updated: count_from_i64(row.try_get("ports_updated")?, "ports_updated")?,
        statistics_collected: count_from_i64(
            row.try_get("statistics_collected")?,
            "statistics_collected",
        )?,
        errors: count_from_i64(row.try_get("errors")?, "errors")?,
        options: serde_json::from_str(&options)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db::DEFAULT_MAX_CONNECTIONS;
    use chrono::{Duration, Utc};

    fn run_at(start: chrono::DateTime<Utc>, errors: u64) -> CollectionRun {
        CollectionRun {
            id: None,
            start_time: start,
            duration_secs: 1.5,
            devices_processed: 3,
            ports_updated: 48,
            statistics_collected: 48,
            errors,
            options: serde_json::json!({ "device": null, "force": true, "dry_run": false }),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_recent() {
        let pool = SqlitePool::connect("sqlite::memory:", DEFAULT_MAX_CONNECTIONS)
            .await
            .unwrap();
        let store = RunStore::new(pool);
        let now = Utc::now();

        store.insert(&run_at(now - Duration::hours(1), 0)).await.unwrap();
        let id = store.insert(&run_at(now, 2)).await.unwrap();

        let runs = store.list_recent(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, Some(id));
        assert_eq!(runs[0].errors, 2);
        assert_eq!(runs[0].ports_updated, 48);
        assert_eq!(runs[0].options["force"], true);
        assert_eq!(store.count().await.unwrap(), 2);

        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }
}
