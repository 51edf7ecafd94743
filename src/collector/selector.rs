//! Device selection.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::collector::{CollectorError, RunOptions};
use crate::storage::{Device, DeviceStore};

/// Default freshness window (1 hour).
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(3600);

/// Chooses the devices due for polling in a run.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    devices: DeviceStore,
    freshness_window: Duration,
}

impl DeviceSelector {
    /// Create a selector with the default freshness window.
    pub fn new(devices: DeviceStore) -> Self {
        Self {
            devices,
            freshness_window: DEFAULT_FRESHNESS_WINDOW,
        }
    }

    /// Set the freshness window.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Select devices for a run starting now.
    pub async fn select(&self, options: &RunOptions) -> Result<Vec<Device>, CollectorError> {
        self.select_at(options, Utc::now()).await
    }

    /// Select devices, ordered by id.
    ///
    /// - `device` set: exactly that device, or `InvalidInput` when unknown
    /// - `force`: the whole inventory
    /// - otherwise: devices without a sample at or after `now - window`
    pub async fn select_at(
        &self,
        options: &RunOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<Device>, CollectorError> {
        if let Some(device_id) = options.device.as_deref() {
            return match self
                .devices
                .get(device_id)
                .await
                .map_err(CollectorError::Selector)?
            {
                Some(device) => Ok(vec![device]),
                None => Err(CollectorError::InvalidInput(format!(
                    "unknown device: {device_id}"
                ))),
            };
        }

        if options.force {
            return self.devices.list_all().await.map_err(CollectorError::Selector);
        }

        let cutoff = freshness_cutoff(now, self.freshness_window);
        tracing::debug!(cutoff = %cutoff, "Selecting stale devices");
        self.devices
            .list_stale(cutoff)
            .await
            .map_err(CollectorError::Selector)
    }
}

fn freshness_cutoff(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
