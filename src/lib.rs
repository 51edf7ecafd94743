//! portstat - SNMP interface statistics collector
//!
//! Polls network devices over SNMP v2c for interface identity, inbound error
//! counts and link speed, and stores them as a time series in SQLite. Each
//! invocation performs one collection run and leaves one audit record.
//!
//! # Architecture
//!
//! - **SNMP**: OID catalog, session and connector traits, UDP client
//! - **Collector**: Device selection, discovery, sampling, run orchestration
//! - **Storage**: SQLite pool, migrations, one facade per table
//! - **Config**: YAML configuration with environment expansion
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use portstat::{AppConfig, Orchestrator, RunOptions, StorageBuilder, UdpConnector};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load_or_default("configs/portstat.yaml")?;
//!     let handles = StorageBuilder::new(&config.database.url)
//!         .max_connections(config.database.max_connections)
//!         .build()
//!         .await?;
//!
//!     let orchestrator = Orchestrator::new(&handles, Arc::new(UdpConnector), config.session_policy())
//!         .with_workers(config.collection.workers);
//!     let run = orchestrator.run_once(RunOptions::default()).await?;
//!     println!("{} statistics collected", run.statistics_collected);
//!
//!     handles.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod collector;
pub mod config;
pub mod snmp;
pub mod storage;

pub use collector::{CollectorError, DeviceReport, DeviceStage, Orchestrator, RunOptions};
pub use config::{AppConfig, ConfigError};
pub use snmp::{Connector, MibObject, Session, SessionPolicy, SnmpError, UdpConnector};
pub use storage::{CollectionRun, Device, StorageBuilder, StorageError, StorageHandles};
