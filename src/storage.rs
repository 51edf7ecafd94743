//! Storage Layer
//!
//! SQLite persistence over a shared sqlx connection pool in WAL mode.
//! Schema migrations are embedded and applied on connect.
//!
//! # Components
//!
//! - [`DeviceStore`]: Read-only access to the external device inventory
//! - [`PortStore`]: Idempotent port registry keyed by (device, interface oid)
//! - [`StatisticStore`]: Append-only counter samples
//! - [`RunStore`]: Collection run audit log
//! - [`StorageBuilder`] / [`StorageHandles`]: Initialization and lifecycle management

mod builder;
pub mod db;
mod devices;
mod error;
mod ports;
mod runs;
mod statistics;
mod types;

pub use builder::{StorageBuilder, StorageHandles};
pub use devices::DeviceStore;
pub use error::StorageError;
pub use ports::{PortStore, UpsertOutcome};
pub use runs::RunStore;
pub use statistics::StatisticStore;
pub use types::{
    CollectionRun, Device, InterfaceDescriptor, NewStatistic, Port, StatisticSample,
    counter_to_i64, from_millis, to_millis,
};

#[cfg(test)]
pub(crate) use devices::test_support;
