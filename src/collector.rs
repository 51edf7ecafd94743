//! Collector Layer
//!
//! The collection engine: device selection, interface discovery, port
//! registration, counter sampling and per-run bookkeeping.
//!
//! # Architecture
//!
//! - [`Orchestrator`]: Single entry point, one [`CollectionRun`](crate::storage::CollectionRun) per call
//! - [`DeviceSelector`]: Chooses the devices due for polling
//! - [`DeviceRunner`]: Per-device `Probe -> Discover -> Register -> Collect` state machine
//! - [`StatisticsCollector`]: Appends error and speed samples for registered ports
//! - [`discover_interfaces`]: Enumerates interfaces with one walk and one get
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portstat::{Orchestrator, RunOptions, SessionPolicy, StorageBuilder, UdpConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handles = StorageBuilder::new("sqlite:data/portstat.db?mode=rwc").build().await?;
//! let orchestrator = Orchestrator::new(
//!     &handles,
//!     Arc::new(UdpConnector),
//!     SessionPolicy::new("public"),
//! );
//! let run = orchestrator.run_once(RunOptions::default().with_force(true)).await?;
//! println!("{} devices processed", run.devices_processed);
//! # Ok(())
//! # }
//! ```

mod device;
mod discovery;
mod orchestrator;
mod selector;
mod statistics;
mod types;

pub use device::{DeviceReport, DeviceRunner, DeviceStage, DeviceStatus};
pub use discovery::discover_interfaces;
pub use orchestrator::{DEFAULT_DEVICE_TIMEOUT, DEFAULT_WORKERS, Orchestrator, RunTally};
pub use selector::{DEFAULT_FRESHNESS_WINDOW, DeviceSelector};
pub use statistics::StatisticsCollector;
pub use types::{CollectOutcome, CollectorError, RunOptions};
