//! Run orchestrator.
//!
//! Selects devices, processes them on a bounded worker pool, merges the
//! per-device reports, and persists one [`CollectionRun`] per invocation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::collector::device::{DeviceReport, DeviceRunner};
use crate::collector::selector::DeviceSelector;
use crate::collector::{CollectorError, RunOptions, StatisticsCollector};
use crate::snmp::{Connector, SessionPolicy};
use crate::storage::{CollectionRun, Device, RunStore, StorageHandles};
use crate::storage::db::SqlitePool;

/// Default number of devices processed concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Default deadline for one device (2 minutes).
pub const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(120);

/// Counters accumulated over one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub devices_processed: u64,
    pub ports_updated: u64,
    pub statistics_collected: u64,
    pub errors: u64,
}

impl RunTally {
    /// Fold one device report into the tally.
    pub fn merge(&mut self, report: &DeviceReport) {
        if report.processed {
            self.devices_processed += 1;
        }
        self.ports_updated += report.ports_updated;
        self.statistics_collected += report.statistics_collected;
        self.errors += report.errors;
    }
}

/// Sequences one collection run.
pub struct Orchestrator {
    pool: SqlitePool,
    selector: DeviceSelector,
    runner: DeviceRunner,
    runs: RunStore,
    workers: usize,
    device_timeout: Duration,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("workers", &self.workers)
            .field("device_timeout", &self.device_timeout)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over the given storage and connector.
    pub fn new(
        storage: &StorageHandles,
        connector: Arc<dyn Connector>,
        policy: SessionPolicy,
    ) -> Self {
        let collector = StatisticsCollector::new(
            Arc::clone(&connector),
            policy.clone(),
            storage.ports.clone(),
            storage.statistics.clone(),
        );
        let runner = DeviceRunner::new(connector, policy, storage.ports.clone(), collector);

        Self {
            pool: storage.pool.clone(),
            selector: DeviceSelector::new(storage.devices.clone()),
            runner,
            runs: storage.runs.clone(),
            workers: DEFAULT_WORKERS,
            device_timeout: DEFAULT_DEVICE_TIMEOUT,
        }
    }

    /// Set the worker pool size (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the per-device deadline.
    pub fn with_device_timeout(mut self, timeout: Duration) -> Self {
        self.device_timeout = timeout;
        self
    }

    /// Set the freshness window used when neither `device` nor `force` is given.
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.selector = self.selector.with_freshness_window(window);
        self
    }

    /// Execute one collection run and persist its record.
    ///
    /// # Errors
    ///
    /// - `DatabaseUnavailable`: the database does not answer; nothing is written
    /// - `Selector` / `InvalidInput`: device selection failed; nothing is written
    /// - `RunNotRecorded`: the work finished but the run record could not be
    ///   written; the error carries the run
    pub async fn run_once(&self, options: RunOptions) -> Result<CollectionRun, CollectorError> {
        let start_time = Utc::now();
        let clock = Instant::now();

        tracing::info!(
            device = ?options.device,
            force = options.force,
            dry_run = options.dry_run,
            "Starting SNMP data collection"
        );

        self.pool
            .ping()
            .await
            .map_err(CollectorError::DatabaseUnavailable)?;

        let devices = self.selector.select(&options).await?;
        if devices.is_empty() {
            tracing::info!("No devices to process");
        } else {
            tracing::info!(count = devices.len(), "Devices selected");
        }

        let tally = if options.dry_run {
            simulate(&devices)
        } else {
            self.process(devices).await
        };

        let options = serde_json::to_value(&options).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to encode run options");
            serde_json::Value::Null
        });
        let mut run = CollectionRun {
            id: None,
            start_time,
            duration_secs: clock.elapsed().as_secs_f64(),
            devices_processed: tally.devices_processed,
            ports_updated: tally.ports_updated,
            statistics_collected: tally.statistics_collected,
            errors: tally.errors,
            options,
        };

        let id = match self.runs.insert(&run).await {
            Ok(id) => id,
            Err(source) => {
                return Err(CollectorError::RunNotRecorded {
                    run: Box::new(run),
                    source,
                });
            }
        };
        run.id = Some(id);

        tracing::info!(
            run_id = id,
            duration_secs = run.duration_secs,
            devices_processed = run.devices_processed,
            ports_updated = run.ports_updated,
            statistics_collected = run.statistics_collected,
            errors = run.errors,
            "Collection run recorded"
        );
        Ok(run)
    }

    /// Process devices on the worker pool and merge their reports.
    async fn process(&self, devices: Vec<Device>) -> RunTally {
        let mut tally = RunTally::default();
        if devices.is_empty() {
            return tally;
        }

        let soft_deadline = self
            .device_timeout
            .saturating_mul(u32::try_from(devices.len()).unwrap_or(u32::MAX));
        let clock = Instant::now();

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let (tx, mut rx) = mpsc::unbounded_channel::<DeviceReport>();
        let mut tasks = JoinSet::new();

        for device in devices {
            let semaphore = Arc::clone(&semaphore);
            let runner = self.runner.clone();
            let tx = tx.clone();
            let device_timeout = self.device_timeout;

            tasks.spawn(async move {
                let report = match semaphore.acquire_owned().await {
                    Ok(_permit) => runner.run_within(&device, device_timeout).await,
                    Err(_) => DeviceReport::timed_out(&device.id),
                };
                // Receiver outlives every worker.
                let _ = tx.send(report);
            });
        }
        drop(tx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Device worker panicked");
                tally.errors += 1;
            }
        }

        while let Some(report) = rx.recv().await {
            tally.merge(&report);
        }

        let elapsed = clock.elapsed();
        if elapsed > soft_deadline {
            tracing::warn!(
                elapsed_secs = elapsed.as_secs_f64(),
                deadline_secs = soft_deadline.as_secs_f64(),
                "Run exceeded its soft deadline"
            );
        }

        tally
    }
}

/// Dry-run: count every selected device as processed without contacting it.
fn simulate(devices: &[Device]) -> RunTally {
    let mut tally = RunTally::default();
    for device in devices {
        tracing::info!(
            device = %device.id,
            address = %device.address,
            "[DRY RUN] Would collect SNMP data"
        );
        tally.merge(&DeviceReport::skipped(&device.id));
    }
    tally
}
