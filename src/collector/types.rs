//! Collector error and option types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{CollectionRun, StorageError};

/// Errors that stop a collection run.
///
/// Per-device and per-port failures never surface here; they are logged and
/// tallied into the run record instead.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The database handle could not be obtained or does not answer.
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(#[source] StorageError),

    /// The device inventory query failed.
    #[error("device selection failed: {0}")]
    Selector(#[source] StorageError),

    /// The invocation asked for something that does not exist.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The devices were processed but the run record could not be written.
    ///
    /// Carries the unrecorded run so its counters can still be reported.
    #[error("failed to persist run record: {source}")]
    RunNotRecorded {
        run: Box<CollectionRun>,
        #[source]
        source: StorageError,
    },
}

/// Resolved options of one invocation.
///
/// Serialized as-is into the `options` column of the run record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Restrict the run to one device id.
    pub device: Option<String>,
    /// Ignore the freshness window.
    pub force: bool,
    /// Echo progress to stdout.
    pub verbose: bool,
    /// Select and report without any device I/O or writes.
    pub dry_run: bool,
}

impl RunOptions {
    /// Restrict the run to one device.
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Ignore the freshness window.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Enable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enable verbose output.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Rows written and errors counted while sampling one device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectOutcome {
    /// Statistics rows appended.
    pub written: u64,
    /// Failed reads, OID builds and inserts.
    pub errors: u64,
}

impl CollectOutcome {
    /// Add another outcome's counts to this one.
    pub fn absorb(&mut self, other: CollectOutcome) {
        self.written += other.written;
        self.errors += other.errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_options_json_shape() {
        let options = RunOptions::default().with_device("D1").with_force(true);
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "device": "D1",
                "force": true,
                "verbose": false,
                "dry_run": false
            })
        );
    }

    #[test]
    fn test_error_messages() {
        let err = CollectorError::InvalidInput("unknown device: D9".to_string());
        assert_eq!(err.to_string(), "invalid input: unknown device: D9");

        let err = CollectorError::Selector(StorageError::InvalidData("devices".to_string()));
        assert!(err.to_string().starts_with("device selection failed"));
    }
}
