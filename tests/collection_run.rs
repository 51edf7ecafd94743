//! Collection Run Integration Tests
//!
//! Drives the public orchestrator API end to end against an in-memory SQLite
//! database and scripted SNMP agents.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use portstat::collector::{CollectorError, Orchestrator, RunOptions, StatisticsCollector};
use portstat::snmp::{Connector, MibObject, Oid, Session, SessionPolicy, SnmpError, SnmpValue};
use portstat::storage::{Device, InterfaceDescriptor, StorageBuilder, StorageHandles, to_millis};

// =============================================================================
// Test Helpers
// =============================================================================

/// Scripted agent contents.
#[derive(Debug, Clone, Default)]
struct Agent {
    values: Vec<(Oid, SnmpValue)>,
    reachable: bool,
    hang: bool,
    stall_at: Option<Oid>,
}

impl Agent {
    fn switch(description: &str) -> Self {
        let mut agent = Self {
            reachable: true,
            ..Self::default()
        };
        agent.set(MibObject::SysDescr.oid(), SnmpValue::Text("Test switch".to_string()));
        agent.set(
            MibObject::IfDescr.instance("1").unwrap(),
            SnmpValue::Text(description.to_string()),
        );
        agent
    }

    fn interface(mut self, index: &str, name: &str, errors: u64, speed: u64) -> Self {
        self.set(
            MibObject::IfName.instance(index).unwrap(),
            SnmpValue::Text(name.to_string()),
        );
        self.set(
            MibObject::IfInErrors.instance(index).unwrap(),
            SnmpValue::Unsigned(errors),
        );
        self.set(
            MibObject::IfHighSpeed.instance(index).unwrap(),
            SnmpValue::Unsigned(speed),
        );
        self
    }

    fn unreachable() -> Self {
        Self::default()
    }

    fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    fn stalling_at(mut self, oid: Oid) -> Self {
        self.stall_at = Some(oid);
        self
    }

    fn set(&mut self, oid: Oid, value: SnmpValue) {
        self.values.retain(|(existing, _)| existing != &oid);
        self.values.push((oid, value));
        self.values.sort_by(|a, b| a.0.arcs().cmp(b.0.arcs()));
    }
}

#[derive(Clone, Default)]
struct ScriptedConnector {
    agents: HashMap<String, Agent>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    fn with(mut self, address: &str, agent: Agent) -> Self {
        self.agents.insert(address.to_string(), agent);
        self
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for ScriptedConnector {
    async fn open(
        &self,
        address: &str,
        _policy: &SessionPolicy,
    ) -> Result<Box<dyn Session>, SnmpError> {
        let agent = self
            .agents
            .get(address)
            .cloned()
            .ok_or_else(|| SnmpError::Connect(format!("{address}: unreachable")))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            address: address.to_string(),
            agent,
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct ScriptedSession {
    address: String,
    agent: Agent,
    closed: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Session for ScriptedSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get(&self, oid: &Oid) -> Result<SnmpValue, SnmpError> {
        if self.agent.hang || self.agent.stall_at.as_ref() == Some(oid) {
            std::future::pending::<()>().await;
        }
        if !self.agent.reachable {
            return Err(SnmpError::Timeout(self.address.clone()));
        }
        self.agent
            .values
            .iter()
            .find(|(existing, _)| existing == oid)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| SnmpError::NoSuchObject(oid.to_string()))
    }

    async fn walk(&self, subtree: &Oid) -> Result<Vec<(Oid, SnmpValue)>, SnmpError> {
        if !self.agent.reachable {
            return Err(SnmpError::Timeout(self.address.clone()));
        }
        Ok(self
            .agent
            .values
            .iter()
            .filter(|(oid, _)| {
                oid.arcs().len() > subtree.arcs().len() && oid.arcs().starts_with(subtree.arcs())
            })
            .cloned()
            .collect())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

async fn create_storage(devices: &[Device]) -> StorageHandles {
    let handles = StorageBuilder::new("sqlite::memory:")
        .build()
        .await
        .expect("Failed to build storage");

    for device in devices {
        sqlx::query("INSERT INTO devices (deviceid, ipaddress, device_name, type) VALUES (?, ?, ?, ?)")
            .bind(&device.id)
            .bind(&device.address)
            .bind(&device.name)
            .bind(&device.device_type)
            .execute(handles.pool.inner())
            .await
            .expect("Failed to seed device");
    }
    handles
}

fn orchestrator(handles: &StorageHandles, connector: &ScriptedConnector) -> Orchestrator {
    Orchestrator::new(handles, Arc::new(connector.clone()), SessionPolicy::default())
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn test_single_device_forced_run() {
    let connector = ScriptedConnector::default().with(
        "10.0.0.5",
        Agent::switch("Core switch")
            .interface("1", "eth0", 0, 1000)
            .interface("2", "eth1", 5, 100),
    );
    let handles = create_storage(&[Device::new("D1", "10.0.0.5")]).await;

    let run = orchestrator(&handles, &connector)
        .run_once(RunOptions::default().with_device("D1").with_force(true))
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 1);
    assert_eq!(run.ports_updated, 2);
    assert_eq!(run.statistics_collected, 2);
    assert_eq!(run.errors, 0);
    assert_eq!(run.options["device"], "D1");
    assert_eq!(run.options["force"], true);

    let ports = handles.ports.list_for_device("D1").await.unwrap();
    assert_eq!(ports.len(), 2);
    assert_eq!(ports[0].interface_name, "eth0");
    assert_eq!(ports[1].interface_name, "eth1");
    assert!(ports.iter().all(|p| p.device_name == "Core switch"));

    let eth0 = handles.statistics.list_for_port(ports[0].id).await.unwrap();
    let eth1 = handles.statistics.list_for_port(ports[1].id).await.unwrap();
    assert_eq!((eth0[0].interface_errors, eth0[0].high_speed), (0, 1000));
    assert_eq!((eth1[0].interface_errors, eth1[0].high_speed), (5, 100));
    assert_eq!(eth1[0].error_oid, "1.3.6.1.2.1.2.2.1.14.2");

    let logged = handles.runs.list_recent(5).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].statistics_collected, 2);
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.closed(), 1);
}

#[tokio::test]
async fn test_repeated_runs_never_duplicate_ports() {
    let connector = ScriptedConnector::default().with(
        "10.0.0.5",
        Agent::switch("Core switch").interface("1", "eth0", 0, 1000),
    );
    let handles = create_storage(&[Device::new("D1", "10.0.0.5")]).await;
    let orchestrator = orchestrator(&handles, &connector);
    let options = RunOptions::default().with_force(true);

    orchestrator.run_once(options.clone()).await.unwrap();
    orchestrator.run_once(options).await.unwrap();

    assert_eq!(handles.ports.count().await.unwrap(), 1);
    assert_eq!(handles.statistics.count().await.unwrap(), 2);
    assert_eq!(handles.runs.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_unreachable_device_is_isolated() {
    let connector = ScriptedConnector::default()
        .with("10.0.0.1", Agent::unreachable())
        .with("10.0.0.2", Agent::switch("B").interface("1", "eth0", 1, 10));
    let handles = create_storage(&[
        Device::new("A", "10.0.0.1"),
        Device::new("B", "10.0.0.2"),
        Device::new("C", "192.0.2.1"),
    ])
    .await;

    let run = orchestrator(&handles, &connector)
        .run_once(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 1);
    assert!(run.errors >= 2);
    assert_eq!(run.statistics_collected, 1);
    assert!(handles.ports.list_for_device("A").await.unwrap().is_empty());
    assert_eq!(connector.opened(), connector.closed());
}

#[tokio::test]
async fn test_device_without_interfaces() {
    let connector = ScriptedConnector::default().with("10.0.0.1", Agent::switch("bare"));
    let handles = create_storage(&[Device::new("A", "10.0.0.1")]).await;

    let run = orchestrator(&handles, &connector)
        .run_once(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 0);
    assert_eq!(run.ports_updated, 0);
    assert_eq!(run.statistics_collected, 0);
    assert_eq!(run.errors, 0);
}

#[tokio::test]
async fn test_dry_run_writes_only_the_run_record() {
    let connector = ScriptedConnector::default().with(
        "10.0.0.1",
        Agent::switch("A").interface("1", "eth0", 0, 1000),
    );
    let handles =
        create_storage(&[Device::new("A", "10.0.0.1"), Device::new("B", "10.0.0.2")]).await;

    let run = orchestrator(&handles, &connector)
        .run_once(RunOptions::default().with_dry_run(true).with_verbose(true))
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 2);
    assert_eq!(connector.opened(), 0);
    assert_eq!(handles.ports.count().await.unwrap(), 0);
    assert_eq!(handles.statistics.count().await.unwrap(), 0);
    assert_eq!(handles.runs.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_freshness_window_selection() {
    let connector = ScriptedConnector::default()
        .with("10.0.0.1", Agent::switch("A").interface("1", "eth0", 0, 10))
        .with("10.0.0.2", Agent::switch("B").interface("1", "eth0", 0, 10));
    let handles =
        create_storage(&[Device::new("A", "10.0.0.1"), Device::new("B", "10.0.0.2")]).await;

    let interface = InterfaceDescriptor {
        index: "1".to_string(),
        name: "eth0".to_string(),
        device_description: "seed".to_string(),
    };
    let now = Utc::now();
    for (device, age) in [("A", TimeDelta::minutes(90)), ("B", TimeDelta::minutes(30))] {
        let port_id = handles.ports.upsert_one(device, &interface).await.unwrap();
        sqlx::query(
            "INSERT INTO statistics (portid, erroroid, interfaceerror, highspeedoid, ifhighspeed, time)
             VALUES (?, 'e', 0, 'h', 0, ?)",
        )
        .bind(port_id)
        .bind(to_millis(now - age))
        .execute(handles.pool.inner())
        .await
        .unwrap();
    }

    let run = orchestrator(&handles, &connector)
        .run_once(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 1);
    assert_eq!(connector.opened(), 1);
    let a_port = &handles.ports.list_for_device("A").await.unwrap()[0];
    assert_eq!(handles.statistics.list_for_port(a_port.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_device_fails_before_any_session() {
    let connector = ScriptedConnector::default().with("10.0.0.1", Agent::switch("A"));
    let handles = create_storage(&[Device::new("A", "10.0.0.1")]).await;

    let result = orchestrator(&handles, &connector)
        .run_once(RunOptions::default().with_device("NOPE"))
        .await;

    assert!(matches!(result, Err(CollectorError::InvalidInput(_))));
    assert_eq!(connector.opened(), 0);
    assert_eq!(handles.runs.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_hung_device_does_not_block_others() {
    let connector = ScriptedConnector::default()
        .with("10.0.0.1", Agent::switch("A").hanging())
        .with("10.0.0.2", Agent::switch("B").interface("1", "eth0", 0, 10))
        .with("10.0.0.3", Agent::switch("C").interface("1", "eth0", 0, 10));
    let handles = create_storage(&[
        Device::new("A", "10.0.0.1"),
        Device::new("B", "10.0.0.2"),
        Device::new("C", "10.0.0.3"),
    ])
    .await;

    let run = orchestrator(&handles, &connector)
        .with_workers(2)
        .with_device_timeout(Duration::from_millis(300))
        .run_once(RunOptions::default())
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 2);
    assert_eq!(run.errors, 1);
    assert_eq!(connector.opened(), 3);
    assert_eq!(connector.closed(), 3);
}

#[tokio::test]
async fn test_run_record_matches_rows_after_cancellation() {
    let connector = ScriptedConnector::default().with(
        "10.0.0.5",
        Agent::switch("Core switch")
            .interface("1", "eth0", 0, 1000)
            .interface("2", "eth1", 5, 100)
            .stalling_at(MibObject::IfInErrors.instance("2").unwrap()),
    );
    let handles = create_storage(&[Device::new("D1", "10.0.0.5")]).await;

    let run = orchestrator(&handles, &connector)
        .with_device_timeout(Duration::from_millis(300))
        .run_once(RunOptions::default().with_force(true))
        .await
        .unwrap();

    assert_eq!(run.devices_processed, 0);
    assert_eq!(run.errors, 1);
    assert_eq!(run.ports_updated, 2);
    assert_eq!(run.statistics_collected, 1);
    assert_eq!(run.ports_updated, handles.ports.count().await.unwrap());
    assert_eq!(run.statistics_collected, handles.statistics.count().await.unwrap());

    let logged = &handles.runs.list_recent(1).await.unwrap()[0];
    assert_eq!(logged.statistics_collected, 1);
    assert_eq!(connector.closed(), 1);
}

#[tokio::test]
async fn test_standalone_collector_closes_its_session() {
    let connector = ScriptedConnector::default().with(
        "10.0.0.5",
        Agent::switch("Core").interface("3", "ge-0/0/3", 12, 10_000),
    );
    let handles = create_storage(&[Device::new("D1", "10.0.0.5")]).await;
    let registered = handles
        .ports
        .upsert(
            "D1",
            &[InterfaceDescriptor {
                index: "3".to_string(),
                name: "ge-0/0/3".to_string(),
                device_description: "Core".to_string(),
            }],
        )
        .await;
    assert_eq!(registered.touched, 1);

    let collector = StatisticsCollector::new(
        Arc::new(connector.clone()),
        SessionPolicy::default(),
        handles.ports.clone(),
        handles.statistics.clone(),
    );
    let outcome = collector.collect(&Device::new("D1", "10.0.0.5")).await;

    assert_eq!(outcome.written, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.closed(), 1);
}
