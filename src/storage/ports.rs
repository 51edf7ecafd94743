//! Port registry.
//!
//! The only writer of the `ports` table. Every write is an atomic
//! insert-or-update keyed by `(deviceid, interfaceoid)`, so repeated
//! discovery of the same interface never creates a duplicate row.

use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::storage::StorageError;
use crate::storage::db::SqlitePool;
use crate::storage::types::{InterfaceDescriptor, Port, count_from_i64};

/// Result of registering a batch of interfaces for one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows inserted or updated.
    pub touched: u64,
    /// Interfaces whose write failed.
    pub errors: u64,
}

impl UpsertOutcome {
    fn record(&mut self, written: bool) {
        if written {
            self.touched += 1;
        } else {
            self.errors += 1;
        }
    }
}

/// Port registry facade.
#[derive(Debug, Clone)]
pub struct PortStore {
    pool: SqlitePool,
}

impl PortStore {
    /// Create a new port store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register discovered interfaces for a device.
    ///
    /// Inserts unknown interfaces and refreshes the name fields of known ones.
    /// A failure on one interface is logged and counted; the rest still run.
    pub async fn upsert(
        &self,
        device_id: &str,
        interfaces: &[InterfaceDescriptor],
    ) -> UpsertOutcome {
        let mut outcome = UpsertOutcome::default();
        self.upsert_each(device_id, interfaces, |written| outcome.record(written))
            .await;
        outcome
    }

    /// Like [`upsert`](Self::upsert), handing each result to `record` as soon
    /// as that interface's write finishes.
    ///
    /// A caller dropped midway has still seen every completed write.
    pub async fn upsert_each<F>(
        &self,
        device_id: &str,
        interfaces: &[InterfaceDescriptor],
        mut record: F,
    ) where
        F: FnMut(bool) + Send,
    {
        for interface in interfaces {
            let written = self.register(device_id, interface).await;
            record(written);
        }
    }

    /// Register one discovered interface, logging the result.
    ///
    /// Returns `false` when the row could not be written.
    async fn register(&self, device_id: &str, interface: &InterfaceDescriptor) -> bool {
        match self.upsert_one(device_id, interface).await {
            Ok(port_id) => {
                tracing::debug!(
                    device = %device_id,
                    interface = %interface.index,
                    port_id,
                    "Port registered"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    device = %device_id,
                    interface = %interface.index,
                    error = %e,
                    "Error updating port data"
                );
                false
            }
        }
    }

    /// Upsert a single interface and return its port id.
    pub async fn upsert_one(
        &self,
        device_id: &str,
        interface: &InterfaceDescriptor,
    ) -> Result<i64, StorageError> {
        let sql = r#"
            INSERT INTO ports (deviceid, interfaceoid, devicename, interfacename)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (deviceid, interfaceoid) DO UPDATE SET
                devicename = excluded.devicename,
                interfacename = excluded.interfacename
            RETURNING id
        "#;

        let (id,): (i64,) = sqlx::query_as(sql)
            .bind(device_id)
            .bind(&interface.index)
            .bind(&interface.device_description)
            .bind(&interface.name)
            .fetch_one(self.pool.inner())
            .await?;

        Ok(id)
    }

    /// List every registered port of a device, ordered by interface oid.
    pub async fn list_for_device(&self, device_id: &str) -> Result<Vec<Port>, StorageError> {
        let rows = sqlx::query(
            "SELECT id, deviceid, interfaceoid, devicename, interfacename
             FROM ports WHERE deviceid = ? ORDER BY interfaceoid",
        )
        .bind(device_id)
        .fetch_all(self.pool.inner())
        .await?;

        rows.iter().map(port_from_row).collect()
    }

    /// Count all registered ports.
    pub async fn count(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ports")
            .fetch_one(self.pool.inner())
            .await?;
        count_from_i64(count, "count")
    }
}

fn port_from_row(row: &SqliteRow) -> Result<Port, StorageError> {
    Ok(Port {
        id: row.try_get("id")?,
        device_id: row.try_get("deviceid")?,
        interface_oid: row.try_get("interfaceoid")?,
        device_name: row.try_get("devicename")?,
        interface_name: row.try_get("interfacename")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Device;
    use crate::storage::db::DEFAULT_MAX_CONNECTIONS;
    use crate::storage::devices::test_support::seed_device;

    async fn create_test_store() -> (SqlitePool, PortStore) {
        let pool = SqlitePool::connect("sqlite::memory:", DEFAULT_MAX_CONNECTIONS)
            .await
            .unwrap();
        seed_device(&pool, &Device::new("D1", "10.0.0.5")).await;
        (pool.clone(), PortStore::new(pool))
    }

    fn interface(index: &str, name: &str, description: &str) -> InterfaceDescriptor {
        InterfaceDescriptor {
            index: index.to_string(),
            name: name.to_string(),
            device_description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (_pool, store) = create_test_store().await;
        let interfaces = vec![
            interface("1", "eth0", "switch-a"),
            interface("2", "eth1", "switch-a"),
        ];

        let first = store.upsert("D1", &interfaces).await;
        let second = store.upsert("D1", &interfaces).await;

        assert_eq!(first, UpsertOutcome { touched: 2, errors: 0 });
        assert_eq!(second, UpsertOutcome { touched: 2, errors: 0 });

        let ports = store.list_for_device("D1").await.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(ports[0].interface_oid, "1");
        assert_eq!(ports[1].interface_oid, "2");
    }

    #[tokio::test]
    async fn test_upsert_updates_names_in_place() {
        let (_pool, store) = create_test_store().await;

        let id_before = store
            .upsert_one("D1", &interface("7", "ge-0/0/7", "old-desc"))
            .await
            .unwrap();
        let id_after = store
            .upsert_one("D1", &interface("7", "uplink", "new-desc"))
            .await
            .unwrap();

        assert_eq!(id_before, id_after);
        let ports = store.list_for_device("D1").await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].interface_name, "uplink");
        assert_eq!(ports[0].device_name, "new-desc");
    }

    #[tokio::test]
    async fn test_upsert_counts_failures_and_continues() {
        let (_pool, store) = create_test_store().await;

        // Unknown device violates the foreign key.
        let outcome = store
            .upsert("ghost", &[interface("1", "eth0", "x"), interface("2", "eth1", "x")])
            .await;
        assert_eq!(outcome, UpsertOutcome { touched: 0, errors: 2 });

        let outcome = store.upsert("D1", &[interface("1", "eth0", "x")]).await;
        assert_eq!(outcome.touched, 1);
    }

    #[tokio::test]
    async fn test_upsert_each_reports_every_write() {
        let (_pool, store) = create_test_store().await;
        let interfaces = [interface("1", "eth0", "x"), interface("2", "eth1", "x")];
        let mut results = Vec::new();

        store
            .upsert_each("D1", &interfaces, |written| results.push(written))
            .await;

        assert_eq!(results, vec![true, true]);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
