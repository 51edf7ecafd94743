//! Per-device collection state machine.
//!
//! A device moves through `Probe -> Discover -> Register -> Collect` over a
//! single session and ends `Done` or `Failed(stage)`. Every transition is
//! logged, and the outcome is returned as a [`DeviceReport`] for the run tally.

use std::sync::Arc;
use std::time::Duration;

use strum_macros::{AsRefStr, Display};

use crate::collector::StatisticsCollector;
use crate::collector::discovery::discover_interfaces;
use crate::snmp::{Connector, Reachability, Session, SessionPolicy, probe};
use crate::storage::{Device, InterfaceDescriptor, PortStore};

/// Processing stage of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStage {
    /// Open the session and read `sysDescr.0`.
    Probe,
    /// Walk `ifName`.
    Discover,
    /// Upsert discovered interfaces into the port registry.
    Register,
    /// Sample counters for every registered port.
    Collect,
}

/// Terminal state of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// All stages ran, or discovery found nothing to do.
    Done,
    /// The named stage failed and the device was abandoned.
    Failed(DeviceStage),
    /// The per-device deadline expired.
    TimedOut,
    /// Dry-run: selected, not contacted.
    Skipped,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Done => write!(f, "done"),
            Self::Failed(stage) => write!(f, "failed({stage})"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Outcome of processing one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub device_id: String,
    pub status: DeviceStatus,
    /// Whether the device counts towards `devices_processed`.
    pub processed: bool,
    /// Interfaces returned by discovery.
    pub interfaces: u64,
    pub ports_updated: u64,
    pub statistics_collected: u64,
    pub errors: u64,
}

impl DeviceReport {
    /// Empty report for a device about to be processed.
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            status: DeviceStatus::Done,
            processed: false,
            interfaces: 0,
            ports_updated: 0,
            statistics_collected: 0,
            errors: 0,
        }
    }

    /// Report for a device whose deadline expired.
    pub fn timed_out(device_id: &str) -> Self {
        Self {
            status: DeviceStatus::TimedOut,
            errors: 1,
            ..Self::new(device_id)
        }
    }

    /// Report for a device selected in dry-run mode.
    pub fn skipped(device_id: &str) -> Self {
        Self {
            status: DeviceStatus::Skipped,
            processed: true,
            ..Self::new(device_id)
        }
    }

    /// Mark the device as cancelled by its deadline.
    ///
    /// Counts gathered before cancellation are kept.
    pub fn time_out(&mut self) {
        self.status = DeviceStatus::TimedOut;
        self.processed = false;
        self.errors += 1;
    }

    fn fail(&mut self, stage: DeviceStage) {
        self.status = DeviceStatus::Failed(stage);
        self.errors += 1;
    }
}

/// Runs the stage machine for one device at a time.
///
/// Cheap to clone; each worker task holds its own copy.
#[derive(Clone)]
pub struct DeviceRunner {
    connector: Arc<dyn Connector>,
    policy: SessionPolicy,
    ports: PortStore,
    collector: StatisticsCollector,
}

impl std::fmt::Debug for DeviceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRunner")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DeviceRunner {
    /// Create a runner.
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: SessionPolicy,
        ports: PortStore,
        collector: StatisticsCollector,
    ) -> Self {
        Self {
            connector,
            policy,
            ports,
            collector,
        }
    }

    /// Process one device end to end, cancelling it once `deadline` expires.
    ///
    /// Never fails: every problem is logged and counted in the report. Rows
    /// written before cancellation stay counted.
    pub async fn run_within(&self, device: &Device, deadline: Duration) -> DeviceReport {
        let mut report = DeviceReport::new(&device.id);

        let finished = tokio::time::timeout(deadline, self.process(device, &mut report))
            .await
            .is_ok();
        if !finished {
            tracing::error!(
                device = %device.id,
                address = %device.address,
                timeout_secs = deadline.as_secs_f64(),
                ports = report.ports_updated,
                statistics = report.statistics_collected,
                "Device deadline exceeded, cancelled"
            );
            report.time_out();
        }

        self.finish(device, &report);
        report
    }

    /// Run the stages into `report`.
    ///
    /// Counters are updated as each row is written, so a caller that drops
    /// this future still sees the work done so far. The session is released
    /// on return and on drop.
    pub async fn process(&self, device: &Device, report: &mut DeviceReport) {
        let session = match self.connector.open(&device.address, &self.policy).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    device = %device.id,
                    address = %device.address,
                    error = %e,
                    "SNMP connectivity test failed"
                );
                report.fail(DeviceStage::Probe);
                return;
            }
        };

        self.drive(session.as_ref(), device, report).await;
        session.close();
    }

    fn finish(&self, device: &Device, report: &DeviceReport) {
        tracing::info!(
            device = %device.id,
            status = %report.status,
            interfaces = report.interfaces,
            ports = report.ports_updated,
            statistics = report.statistics_collected,
            errors = report.errors,
            "Device finished"
        );
    }

    async fn drive(&self, session: &dyn Session, device: &Device, report: &mut DeviceReport) {
        let mut interfaces = Vec::new();
        let mut stage = Some(DeviceStage::Probe);

        while let Some(current) = stage {
            tracing::debug!(device = %device.id, stage = %current, "Entering stage");
            stage = match current {
                DeviceStage::Probe => self.check_reachable(session, device, report).await,
                DeviceStage::Discover => {
                    self.discover(session, device, report, &mut interfaces).await
                }
                DeviceStage::Register => self.register(device, &interfaces, report).await,
                DeviceStage::Collect => self.collect(session, device, report).await,
            };
        }
    }

    async fn check_reachable(
        &self,
        session: &dyn Session,
        device: &Device,
        report: &mut DeviceReport,
    ) -> Option<DeviceStage> {
        match probe(session).await {
            Reachability::Reachable(description) => {
                tracing::debug!(device = %device.id, sys_descr = %description, "Device reachable");
                Some(DeviceStage::Discover)
            }
            Reachability::Unreachable(reason) => {
                tracing::error!(
                    device = %device.id,
                    address = %device.address,
                    reason = %reason,
                    "SNMP connectivity test failed"
                );
                report.fail(DeviceStage::Probe);
                None
            }
        }
    }

    async fn discover(
        &self,
        session: &dyn Session,
        device: &Device,
        report: &mut DeviceReport,
        interfaces: &mut Vec<InterfaceDescriptor>,
    ) -> Option<DeviceStage> {
        match discover_interfaces(session).await {
            Ok(found) if found.is_empty() => {
                tracing::info!(device = %device.id, address = %device.address, "No interfaces found");
                None
            }
            Ok(found) => {
                report.interfaces = found.len() as u64;
                *interfaces = found;
                Some(DeviceStage::Register)
            }
            Err(e) => {
                tracing::error!(
                    device = %device.id,
                    address = %device.address,
                    error = %e,
                    "Error collecting interface data"
                );
                report.fail(DeviceStage::Discover);
                None
            }
        }
    }

    async fn register(
        &self,
        device: &Device,
        interfaces: &[InterfaceDescriptor],
        report: &mut DeviceReport,
    ) -> Option<DeviceStage> {
        self.ports
            .upsert_each(&device.id, interfaces, |written| {
                if written {
                    report.ports_updated += 1;
                } else {
                    report.errors += 1;
                }
            })
            .await;
        Some(DeviceStage::Collect)
    }

    async fn collect(
        &self,
        session: &dyn Session,
        device: &Device,
        report: &mut DeviceReport,
    ) -> Option<DeviceStage> {
        match self.collector.registered_ports(session, &device.id).await {
            Some(ports) => {
                for port in &ports {
                    let outcome = self.collector.sample_port(session, port).await;
                    report.statistics_collected += outcome.written;
                    report.errors += outcome.errors;
                }
            }
            None => report.errors += 1,
        }
        report.processed = true;
        None
    }
}
