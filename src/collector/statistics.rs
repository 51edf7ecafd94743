//! Statistics collector.
//!
//! Samples `ifInErrors` and `ifHighSpeed` for every registered port of a
//! device and appends one row per port.

use std::sync::Arc;

use chrono::Utc;

use crate::collector::CollectOutcome;
use crate::snmp::{Connector, MibObject, Oid, Session, SessionPolicy};
use crate::storage::{Device, NewStatistic, Port, PortStore, StatisticStore};

/// Appends counter samples for registered ports.
#[derive(Clone)]
pub struct StatisticsCollector {
    connector: Arc<dyn Connector>,
    policy: SessionPolicy,
    ports: PortStore,
    statistics: StatisticStore,
}

impl std::fmt::Debug for StatisticsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsCollector")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl StatisticsCollector {
    /// Create a new statistics collector.
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: SessionPolicy,
        ports: PortStore,
        statistics: StatisticStore,
    ) -> Self {
        Self {
            connector,
            policy,
            ports,
            statistics,
        }
    }

    /// Sample a device over a session of its own.
    ///
    /// The session is closed before returning on every path. A session that
    /// cannot be opened counts one error and writes nothing.
    pub async fn collect(&self, device: &Device) -> CollectOutcome {
        let session = match self.connector.open(&device.address, &self.policy).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(
                    device = %device.id,
                    address = %device.address,
                    error = %e,
                    "Error collecting statistics"
                );
                return CollectOutcome {
                    written: 0,
                    errors: 1,
                };
            }
        };

        let outcome = self.sample_ports(session.as_ref(), &device.id).await;
        session.close();
        outcome
    }

    /// Sample every registered port of `device_id` over an open session.
    pub async fn sample_ports(&self, session: &dyn Session, device_id: &str) -> CollectOutcome {
        let mut outcome = CollectOutcome::default();

        let Some(ports) = self.registered_ports(session, device_id).await else {
            outcome.errors += 1;
            return outcome;
        };

        for port in &ports {
            outcome.absorb(self.sample_port(session, port).await);
        }

        tracing::debug!(
            device = %device_id,
            ports = ports.len(),
            written = outcome.written,
            errors = outcome.errors,
            "Statistics collected"
        );
        outcome
    }

    /// Load the ports to sample, logging a failure.
    pub async fn registered_ports(&self, session: &dyn Session, device_id: &str) -> Option<Vec<Port>> {
        match self.ports.list_for_device(device_id).await {
            Ok(ports) => Some(ports),
            Err(e) => {
                tracing::error!(
                    device = %device_id,
                    address = %session.address(),
                    error = %e,
                    "Error loading ports"
                );
                None
            }
        }
    }

    /// Read both counters of one port and append a sample.
    ///
    /// The returned outcome covers this port only.
    pub async fn sample_port(&self, session: &dyn Session, port: &Port) -> CollectOutcome {
        let mut outcome = CollectOutcome::default();

        let oids = MibObject::IfInErrors
            .instance(&port.interface_oid)
            .and_then(|errors| Ok((errors, MibObject::IfHighSpeed.instance(&port.interface_oid)?)));
        let (error_oid, speed_oid) = match oids {
            Ok(oids) => oids,
            Err(e) => {
                tracing::error!(
                    device = %port.device_id,
                    address = %session.address(),
                    port = port.id,
                    error = %e,
                    "Error collecting statistics"
                );
                outcome.errors += 1;
                return outcome;
            }
        };

        let interface_errors = read_counter(session, port, &error_oid, &mut outcome).await;
        let high_speed = read_counter(session, port, &speed_oid, &mut outcome).await;

        let sample = NewStatistic {
            port_id: port.id,
            error_oid: error_oid.to_string(),
            interface_errors,
            high_speed_oid: speed_oid.to_string(),
            high_speed,
            time: Utc::now(),
        };

        match self.statistics.insert(&sample).await {
            Ok(_) => outcome.written += 1,
            Err(e) => {
                tracing::error!(
                    device = %port.device_id,
                    address = %session.address(),
                    port = port.id,
                    error = %e,
                    "Error inserting statistics"
                );
                outcome.errors += 1;
            }
        }
        outcome
    }
}

/// Read one numeric counter, coalescing failures to zero.
async fn read_counter(
    session: &dyn Session,
    port: &Port,
    oid: &Oid,
    outcome: &mut CollectOutcome,
) -> i64 {
    match session.get(oid).await {
        Ok(value) => match value.as_i64() {
            Some(v) => v,
            None => {
                tracing::warn!(
                    device = %port.device_id,
                    address = %session.address(),
                    port = port.id,
                    oid = %oid,
                    value = ?value,
                    "Non-numeric counter value, storing 0"
                );
                outcome.errors += 1;
                0
            }
        },
        Err(e) => {
            tracing::warn!(
                device = %port.device_id,
                address = %session.address(),
                port = port.id,
                oid = %oid,
                error = %e,
                "Counter read failed, storing 0"
            );
            outcome.errors += 1;
            0
        }
    }
}
