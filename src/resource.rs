//! Local transport resource records and their attribute views.

use crate::caps::{AtomicCaps, IfaceFlags, MdFlags, RscFlags};
use crate::types::{DeviceIndex, DeviceType, MdIndex};

/// A cost that grows linearly with some load factor: `overhead + growth * n`.
/// Used for both per-endpoint latency and memory registration cost.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearCost {
    /// Fixed component, in seconds.
    pub overhead: f64,
    /// Per-unit component, in seconds.
    pub growth: f64,
}

impl LinearCost {
    pub const fn new(overhead: f64, growth: f64) -> Self {
        Self { overhead, growth }
    }
}

/// Performance and capability attributes of a transport interface.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IfaceAttr {
    pub caps: IfaceFlags,
    pub atomic: AtomicCaps,
    /// Per-operation send overhead, in seconds.
    pub overhead: f64,
    /// Advertised bandwidth, in bytes per second.
    pub bandwidth: f64,
    /// Message latency: fixed overhead plus per-endpoint growth.
    pub latency: LinearCost,
    /// Device priority used to break score ties.
    pub priority: u8,
    /// Largest buffered-copy active message, in bytes.
    pub am_max_bcopy: usize,
}

/// Attributes of the memory domain a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MdAttr {
    pub flags: MdFlags,
    /// Memory registration cost: fixed overhead plus per-byte growth.
    pub reg_cost: LinearCost,
}

/// One local transport resource, immutable for the worker's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    /// Transport name, e.g. "rc", "tcp", "mm".
    pub tl_name: String,
    /// Device name, e.g. "mlx5_0:1".
    pub dev_name: String,
    pub md_index: MdIndex,
    pub dev_index: DeviceIndex,
    pub dev_type: DeviceType,
    pub flags: RscFlags,
    pub iface: IfaceAttr,
    /// Attributes of the owning memory domain.
    pub md: MdAttr,
}

impl Resource {
    /// A resource is peer-to-peer when a usable channel needs both sides to
    /// exchange endpoint addresses, i.e. it is not reachable from an
    /// interface address alone.
    pub fn is_p2p(&self) -> bool {
        !self.iface.caps.contains(IfaceFlags::CONNECT_TO_IFACE)
    }

    /// Checksum of the transport name, matched against remote entries.
    pub fn tl_name_csum(&self) -> u16 {
        tl_name_checksum(&self.tl_name)
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tl_name, self.dev_name)
    }
}

/// 16-bit BSD checksum of a transport name. Only used to cross-match local
/// and remote transports and to recover a name for diagnostics.
pub fn tl_name_checksum(name: &str) -> u16 {
    let mut csum: u16 = 0;
    for byte in name.bytes() {
        csum = csum.rotate_right(1).wrapping_add(byte as u16);
    }
    csum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(tl: &str, caps: IfaceFlags) -> Resource {
        Resource {
            tl_name: tl.to_string(),
            dev_name: "dev0".to_string(),
            md_index: 0,
            dev_index: 0,
            dev_type: DeviceType::Net,
            flags: RscFlags::empty(),
            iface: IfaceAttr {
                caps,
                ..Default::default()
            },
            md: MdAttr::default(),
        }
    }

    #[test]
    fn test_p2p_is_lack_of_iface_connect() {
        let iface = resource("rc", IfaceFlags::CONNECT_TO_IFACE | IfaceFlags::CONNECT_TO_EP);
        assert!(!iface.is_p2p());
        let ep_only = resource("rc", IfaceFlags::CONNECT_TO_EP);
        assert!(ep_only.is_p2p());
    }

    #[test]
    fn test_checksum_distinguishes_names() {
        assert_eq!(tl_name_checksum("rc"), tl_name_checksum("rc"));
        assert_ne!(tl_name_checksum("rc"), tl_name_checksum("tcp"));
        assert_ne!(tl_name_checksum("ab"), tl_name_checksum("ba"));
    }

    #[test]
    fn test_display() {
        let r = resource("tcp", IfaceFlags::empty());
        assert_eq!(r.to_string(), "tcp/dev0");
    }
}
