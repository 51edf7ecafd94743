//! Static catalog of the MIB objects read by the collector.

use async_snmp::Oid;
use strum_macros::{AsRefStr, Display, EnumString};

use super::SnmpError;

/// Logical MIB objects with fixed numeric identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum MibObject {
    /// `SNMPv2-MIB::sysDescr.0`, used as the connectivity probe.
    SysDescr,
    /// `IF-MIB::ifDescr`.
    IfDescr,
    /// `IF-MIB::ifName`, walked to enumerate interfaces.
    IfName,
    /// `IF-MIB::ifInErrors`.
    IfInErrors,
    /// `IF-MIB::ifHighSpeed`, in Mbit/s.
    IfHighSpeed,
}

impl MibObject {
    /// Numeric arcs of the object.
    pub fn arcs(self) -> &'static [u32] {
        match self {
            Self::SysDescr => &[1, 3, 6, 1, 2, 1, 1, 1, 0],
            Self::IfDescr => &[1, 3, 6, 1, 2, 1, 2, 2, 1, 2],
            Self::IfName => &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1],
            Self::IfInErrors => &[1, 3, 6, 1, 2, 1, 2, 2, 1, 14],
            Self::IfHighSpeed => &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 15],
        }
    }

    /// Base OID of the object.
    pub fn oid(self) -> Oid {
        Oid::from_slice(self.arcs())
    }

    /// OID of one instance, e.g. `ifInErrors` + `"3"` -> `1.3.6.1.2.1.2.2.1.14.3`.
    ///
    /// The fragment may hold several dotted arcs. Empty arcs, non-numeric
    /// arcs and arcs above `u32::MAX` are rejected.
    pub fn instance(self, fragment: &str) -> Result<Oid, SnmpError> {
        let mut arcs = self.arcs().to_vec();
        for part in fragment.split('.') {
            let arc = part
                .parse::<u32>()
                .map_err(|_| SnmpError::InvalidOid(format!("{self}.{fragment}")))?;
            arcs.push(arc);
        }
        Ok(Oid::from_slice(&arcs))
    }
}

/// Suffix of `oid` below `base` as dotted text.
///
/// Returns `None` when `oid` is outside the subtree or equal to `base`.
pub fn interface_index(base: &Oid, oid: &Oid) -> Option<String> {
    let base = base.arcs();
    let arcs = oid.arcs();
    if arcs.len() <= base.len() || !arcs.starts_with(base) {
        return None;
    }

    let suffix: Vec<String> = arcs[base.len()..].iter().map(u32::to_string).collect();
    Some(suffix.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_catalog_oids() {
        assert_eq!(MibObject::SysDescr.oid().to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(MibObject::IfDescr.oid().to_string(), "1.3.6.1.2.1.2.2.1.2");
        assert_eq!(MibObject::IfName.oid().to_string(), "1.3.6.1.2.1.31.1.1.1.1");
        assert_eq!(MibObject::IfInErrors.oid().to_string(), "1.3.6.1.2.1.2.2.1.14");
        assert_eq!(
            MibObject::IfHighSpeed.oid().to_string(),
            "1.3.6.1.2.1.31.1.1.1.15"
        );
    }

    #[test]
    fn test_mib_object_names() {
        assert_eq!(MibObject::IfHighSpeed.as_ref(), "ifHighSpeed");
        assert_eq!(MibObject::SysDescr.to_string(), "sysDescr");
        assert_eq!(MibObject::from_str("IFINERRORS").unwrap(), MibObject::IfInErrors);
        assert!(MibObject::from_str("ifOutOctets").is_err());
    }

    #[test]
    fn test_instance_appends_fragment() {
        let oid = MibObject::IfInErrors.instance("3").unwrap();
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.2.2.1.14.3");

        let oid = MibObject::IfHighSpeed.instance("1.4").unwrap();
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.31.1.1.1.15.1.4");
    }

    #[test]
    fn test_instance_rejects_malformed_fragment() {
        for fragment in ["", "eth0", "1..2", "4294967296", "-1"] {
            assert!(
                matches!(
                    MibObject::IfInErrors.instance(fragment),
                    Err(SnmpError::InvalidOid(_))
                ),
                "fragment {fragment:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_interface_index() {
        let base = MibObject::IfName.oid();

        let oid = Oid::parse("1.3.6.1.2.1.31.1.1.1.1.12").unwrap();
        assert_eq!(interface_index(&base, &oid).as_deref(), Some("12"));

        let oid = Oid::parse("1.3.6.1.2.1.31.1.1.1.1.1.7").unwrap();
        assert_eq!(interface_index(&base, &oid).as_deref(), Some("1.7"));

        assert_eq!(interface_index(&base, &base), None);

        let outside = Oid::parse("1.3.6.1.2.1.31.1.1.1.15.1").unwrap();
        assert_eq!(interface_index(&base, &outside), None);
    }
}
