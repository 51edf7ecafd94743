//! Interface discovery.

use crate::snmp::{MibObject, Session, SnmpError, interface_index};
use crate::storage::InterfaceDescriptor;

/// Enumerate the interfaces of a device.
///
/// Walks `ifName`; each entry's suffix is the interface index and its value
/// the interface name. When the walk returns anything, `ifDescr.1` is read
/// once and stamped on every interface as the device description. Downstream
/// reports key on that value, so it is not replaced by the per-interface
/// `ifDescr`.
///
/// An empty walk yields an empty list. A failed walk or a failed
/// description read is an error.
pub async fn discover_interfaces(
    session: &dyn Session,
) -> Result<Vec<InterfaceDescriptor>, SnmpError> {
    let base = MibObject::IfName.oid();
    let entries = session.walk(&base).await?;
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let description = session
        .get(&MibObject::IfDescr.instance("1")?)
        .await?
        .as_text();

    let interfaces = entries
        .into_iter()
        .filter_map(|(oid, value)| {
            let index = interface_index(&base, &oid)?;
            Some(InterfaceDescriptor {
                index,
                name: value.as_text(),
                device_description: description.clone(),
            })
        })
        .collect();

    Ok(interfaces)
}
