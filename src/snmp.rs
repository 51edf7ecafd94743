//! SNMP v2c plumbing.
//!
//! - [`MibObject`]: the fixed catalog of objects this crate reads
//! - [`Session`] / [`Connector`]: the protocol seam, one session per device
//! - [`UdpConnector`]: production connector over `async-snmp`
//! - [`probe`]: connectivity check on `sysDescr.0`

mod oids;
mod session;

pub use oids::{MibObject, interface_index};
pub use session::{
    Connector, DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT, Reachability, Session,
    SessionPolicy, SnmpError, SnmpValue, UdpConnector, probe,
};

#[cfg(test)]
pub(crate) use session::test_support;

/// Object identifier type shared by every session implementation.
pub use async_snmp::Oid;
