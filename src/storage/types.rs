//! Core data types for the storage layer.
//!
//! - [`Device`]: inventory entry, owned by an external process
//! - [`InterfaceDescriptor`]: one interface as reported by discovery
//! - [`Port`]: a registered interface, unique per (device, interface oid)
//! - [`NewStatistic`] / [`StatisticSample`]: append-only counter samples
//! - [`CollectionRun`]: the audit record written once per invocation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// A device from the external inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Externally assigned identifier.
    pub id: String,
    /// Management address (`host` or `host:port`).
    pub address: String,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional device type label.
    pub device_type: Option<String>,
}

impl Device {
    /// Create a device with only identity and address.
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            name: None,
            device_type: None,
        }
    }
}

/// One interface as enumerated from a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface index (OID suffix below the `ifName` subtree).
    pub index: String,
    /// Interface name (`ifName` value).
    pub name: String,
    /// Device-reported description stamped on every interface of the device.
    pub device_description: String,
}

/// A registered port row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub device_id: String,
    /// Interface index used as the suffix for per-port counter OIDs.
    pub interface_oid: String,
    pub device_name: String,
    pub interface_name: String,
}

/// A statistics row about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStatistic {
    pub port_id: i64,
    pub error_oid: String,
    pub interface_errors: i64,
    pub high_speed_oid: String,
    pub high_speed: i64,
    pub time: DateTime<Utc>,
}

/// A persisted statistics row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticSample {
    pub id: i64,
    pub port_id: i64,
    pub error_oid: String,
    pub interface_errors: i64,
    pub high_speed_oid: String,
    pub high_speed: i64,
    pub time: DateTime<Utc>,
}

/// Audit record for one collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionRun {
    /// Database ID (None until persisted).
    pub id: Option<i64>,
    pub start_time: DateTime<Utc>,
    /// Wall-clock run duration in seconds.
    pub duration_secs: f64,
    pub devices_processed: u64,
    pub ports_updated: u64,
    pub statistics_collected: u64,
    pub errors: u64,
    /// Resolved options of the invocation, as JSON.
    pub options: serde_json::Value,
}

/// Convert a timestamp to the epoch-millisecond column format.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert an epoch-millisecond column back to a timestamp.
pub fn from_millis(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {ms}")))
}

/// Clamp an unsigned counter into the signed INTEGER column range.
pub fn counter_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Read back a non-negative INTEGER column as an unsigned count.
pub(crate) fn count_from_i64(value: i64, column: &str) -> Result<u64, StorageError> {
    u64::try_from(value)
        .map_err(|_| StorageError::InvalidData(format!("negative {column}: {value}")))
}
