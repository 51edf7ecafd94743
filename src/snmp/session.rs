//! Protocol sessions.
//!
//! A [`Session`] is a read-only SNMP v2c conversation with one device. It is
//! opened through a [`Connector`] and released when closed or dropped, so a
//! cancelled task never leaks its socket.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_snmp::{Auth, Client, Oid, UdpClient, Value};
use strum_macros::AsRefStr;
use thiserror::Error;

use super::MibObject;

/// Standard SNMP agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry count after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;

/// Errors raised by protocol sessions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnmpError {
    /// The session could not be opened (resolution, socket).
    #[error("connect error: {0}")]
    Connect(String),

    /// The agent answered with an error or an undecodable message.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No answer after all retries.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The agent has no instance at the requested OID.
    #[error("no such object: {0}")]
    NoSuchObject(String),

    /// An OID could not be built.
    #[error("invalid oid: {0}")]
    InvalidOid(String),
}

impl From<async_snmp::Error> for SnmpError {
    fn from(err: async_snmp::Error) -> Self {
        match err {
            async_snmp::Error::Timeout { .. } => Self::Timeout(err.to_string()),
            async_snmp::Error::Io { .. } => Self::Connect(err.to_string()),
            async_snmp::Error::InvalidOid { .. } => Self::InvalidOid(err.to_string()),
            _ => Self::Protocol(err.to_string()),
        }
    }
}

/// A value read from a device, reduced to the shapes the collector uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    /// Signed INTEGER.
    Integer(i64),
    /// Counter32, Gauge32, TimeTicks or Counter64.
    Unsigned(u64),
    /// OCTET STRING, decoded lossily as UTF-8.
    Text(String),
    /// Any other type, in display form.
    Other(String),
}

impl SnmpValue {
    /// Numeric view of the value.
    ///
    /// Unsigned values above `i64::MAX` saturate. Text is parsed after trimming.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Unsigned(v) => Some(i64::try_from(*v).unwrap_or(i64::MAX)),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }

    /// Text view of the value.
    pub fn as_text(&self) -> String {
        match self {
            Self::Integer(v) => v.to_string(),
            Self::Unsigned(v) => v.to_string(),
            Self::Text(s) | Self::Other(s) => s.clone(),
        }
    }

    /// Convert a wire value. Exception values are not values.
    fn from_wire(oid: &Oid, value: Value) -> Result<Self, SnmpError> {
        if value.is_exception() {
            return Err(SnmpError::NoSuchObject(oid.to_string()));
        }

        Ok(match value {
            Value::Integer(v) => Self::Integer(i64::from(v)),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                Self::Unsigned(u64::from(v))
            }
            Value::Counter64(v) => Self::Unsigned(v),
            Value::OctetString(bytes) => Self::Text(String::from_utf8_lossy(&bytes).into_owned()),
            other => Self::Other(other.to_string()),
        })
    }
}

/// Retry policy and credentials for opening sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionPolicy {
    /// v2c community string.
    pub community: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries after the first attempt. Fixed count, no backoff.
    pub retries: u32,
    /// Port used when the device address carries none.
    pub port: u16,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            community: "public".to_string(),
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            port: DEFAULT_PORT,
        }
    }
}

impl SessionPolicy {
    /// Create a policy with the given community and default timing.
    pub fn new(community: impl Into<String>) -> Self {
        Self {
            community: community.into(),
            ..Self::default()
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the default agent port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Debug for SessionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPolicy")
            .field("community", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("port", &self.port)
            .finish()
    }
}

/// A read-only session with one device.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
    /// Address the session talks to.
    fn address(&self) -> &str;

    /// Read one scalar.
    async fn get(&self, oid: &Oid) -> Result<SnmpValue, SnmpError>;

    /// Read every instance below `subtree`, in agent order.
    async fn walk(&self, subtree: &Oid) -> Result<Vec<(Oid, SnmpValue)>, SnmpError>;

    /// Release the session. Dropping it has the same effect.
    fn close(self: Box<Self>) {}
}

/// Opens sessions to devices.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a session to `address` (`host` or `host:port`).
    async fn open(
        &self,
        address: &str,
        policy: &SessionPolicy,
    ) -> Result<Box<dyn Session>, SnmpError>;
}

/// Connector over UDP using `async-snmp`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

#[async_trait::async_trait]
impl Connector for UdpConnector {
    async fn open(
        &self,
        address: &str,
        policy: &SessionPolicy,
    ) -> Result<Box<dyn Session>, SnmpError> {
        let target = resolve_target(address, policy.port);

        let client = Client::builder(target.clone(), Auth::v2c(policy.community.as_str()))
            .timeout(policy.timeout)
            .retries(policy.retries)
            .connect()
            .await
            .map_err(|e| SnmpError::Connect(format!("{target}: {e}")))?;

        tracing::debug!(address = %address, target = %target, "SNMP session opened");

        Ok(Box::new(UdpSession {
            address: address.to_string(),
            client,
        }))
    }
}

/// Session backed by a dedicated UDP socket.
struct UdpSession {
    address: String,
    client: UdpClient,
}

#[async_trait::async_trait]
impl Session for UdpSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn get(&self, oid: &Oid) -> Result<SnmpValue, SnmpError> {
        let varbind = self.client.get(oid).await?;
        SnmpValue::from_wire(&varbind.oid, varbind.value)
    }

    async fn walk(&self, subtree: &Oid) -> Result<Vec<(Oid, SnmpValue)>, SnmpError> {
        let varbinds = self.client.walk(subtree.clone())?.collect().await?;

        Ok(varbinds
            .into_iter()
            .filter_map(|vb| {
                SnmpValue::from_wire(&vb.oid, vb.value)
                    .ok()
                    .map(|value| (vb.oid, value))
            })
            .collect())
    }
}

impl Drop for UdpSession {
    fn drop(&mut self) {
        tracing::debug!(address = %self.address, "SNMP session closed");
    }
}

/// Build a `host:port` target, appending `default_port` when absent.
fn resolve_target(address: &str, default_port: u16) -> String {
    let address = address.trim();
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }
    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, default_port).to_string();
    }
    if address.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
        return address.to_string();
    }
    format!("{address}:{default_port}")
}

/// Result of the connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Reachability {
    /// The device answered; carries its `sysDescr`.
    Reachable(String),
    /// The device did not answer usefully; carries the reason.
    Unreachable(String),
}

impl Reachability {
    /// Whether the probe succeeded.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable(_))
    }
}

/// Probe a session with a read of `sysDescr.0`. Never fails.
pub async fn probe(session: &dyn Session) -> Reachability {
    match session.get(&MibObject::SysDescr.oid()).await {
        Ok(value) => {
            let description = value.as_text();
            if description.trim().is_empty() {
                Reachability::Unreachable("empty sysDescr".to_string())
            } else {
                Reachability::Reachable(description)
            }
        }
        Err(e) => Reachability::Unreachable(e.to_string()),
    }
}
