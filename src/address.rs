//! Remote worker address entries, as delivered by the address unpacker.

use crate::caps::{AtomicCaps, IfaceFlags, MdFlags};
use crate::types::{DeviceIndex, MdIndex};

/// The interface capability flags the address packer transmits. Selection
/// criteria may only require remote flags from this subset; anything else
/// would silently never match.
pub const PACKED_IFACE_FLAGS: IfaceFlags = IfaceFlags::CONNECT_TO_IFACE
    .union(IfaceFlags::CB_SYNC)
    .union(IfaceFlags::CB_ASYNC)
    .union(IfaceFlags::AM_BCOPY)
    .union(IfaceFlags::PUT_SHORT)
    .union(IfaceFlags::PUT_BCOPY)
    .union(IfaceFlags::PUT_ZCOPY)
    .union(IfaceFlags::GET_SHORT)
    .union(IfaceFlags::GET_BCOPY)
    .union(IfaceFlags::GET_ZCOPY)
    .union(IfaceFlags::TAG_EAGER_BCOPY)
    .union(IfaceFlags::TAG_RNDV_ZCOPY)
    .union(IfaceFlags::EVENT_RECV)
    .union(IfaceFlags::EVENT_RECV_SIG)
    .union(IfaceFlags::PENDING);

/// Remote interface attributes carried inside an address entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteIfaceAttr {
    pub caps: IfaceFlags,
    pub atomic: AtomicCaps,
    /// Per-operation overhead on the remote side, in seconds.
    pub overhead: f64,
    /// Advertised bandwidth, in bytes per second.
    pub bandwidth: f64,
    /// Fixed latency overhead on the remote side, in seconds.
    pub lat_ovh: f64,
    pub priority: u8,
}

/// One entry of a remote worker's unpacked address list.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressEntry {
    /// Memory domain index on the remote worker.
    pub md_index: MdIndex,
    /// Device index on the remote worker.
    pub dev_index: DeviceIndex,
    /// Capability flags of the remote memory domain.
    pub md_flags: MdFlags,
    /// Checksum of the remote transport name. Used for reachability
    /// cross-matching and diagnostics only.
    pub tl_name_csum: u16,
    pub iface: RemoteIfaceAttr,
}
