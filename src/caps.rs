//! Capability flag universe for transport interfaces, memory domains, and
//! atomics.
//!
//! Every flag has a human-readable name so failed selections can report the
//! first requirement a resource is missing.

use bitflags::bitflags;

bitflags! {
    /// Interface capability flags advertised by a transport resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IfaceFlags: u64 {
        const AM_SHORT               = 1 << 0;
        const AM_BCOPY               = 1 << 1;
        const AM_ZCOPY               = 1 << 2;
        const PUT_SHORT              = 1 << 3;
        const PUT_BCOPY              = 1 << 4;
        const PUT_ZCOPY              = 1 << 5;
        const GET_SHORT              = 1 << 6;
        const GET_BCOPY              = 1 << 7;
        const GET_ZCOPY              = 1 << 8;
        /// Peer failures are detected and reported by the interface.
        const ERRHANDLE_PEER_FAILURE = 1 << 9;
        /// Reachable from an interface address alone.
        const CONNECT_TO_IFACE       = 1 << 10;
        /// Requires an endpoint-address exchange to establish a channel.
        const CONNECT_TO_EP          = 1 << 11;
        /// Reliable delivery with duplicate suppression.
        const AM_DUP                 = 1 << 12;
        const CB_SYNC                = 1 << 13;
        const CB_ASYNC               = 1 << 14;
        const EVENT_SEND_COMP        = 1 << 15;
        /// Wakeup on any incoming tag or active message.
        const EVENT_RECV             = 1 << 16;
        /// Wakeup only on messages the sender marked as signaled.
        const EVENT_RECV_SIG         = 1 << 17;
        const PENDING                = 1 << 18;
        const TAG_EAGER_SHORT        = 1 << 19;
        const TAG_EAGER_BCOPY        = 1 << 20;
        const TAG_EAGER_ZCOPY        = 1 << 21;
        const TAG_RNDV_ZCOPY         = 1 << 22;
    }
}

const IFACE_FLAG_NAMES: [&str; 23] = [
    "am short",
    "am bcopy",
    "am zcopy",
    "put short",
    "put bcopy",
    "put zcopy",
    "get short",
    "get bcopy",
    "get zcopy",
    "peer failure handler",
    "connect to iface",
    "connect to ep",
    "full reliability",
    "sync callback",
    "async callback",
    "send completion event",
    "tag or active message event",
    "signaled message event",
    "pending",
    "tag eager short",
    "tag eager bcopy",
    "tag eager zcopy",
    "tag rndv zcopy",
];

impl IfaceFlags {
    /// Both receive-side wakeup capabilities.
    pub const RECV_EVENT_CAPS: IfaceFlags =
        IfaceFlags::EVENT_RECV.union(IfaceFlags::EVENT_RECV_SIG);

    /// Wakeup that does not require the sender to mark messages as signaled.
    pub const UNSIG_EVENT_CAPS: IfaceFlags = IfaceFlags::EVENT_RECV;

    /// Human-readable name of the lowest set flag.
    pub fn first_name(self) -> &'static str {
        debug_assert!(!self.is_empty());
        IFACE_FLAG_NAMES[self.bits().trailing_zeros() as usize]
    }

    /// Name of the first flag in `required` that `actual` lacks, or `None`
    /// when all requirements are met.
    pub fn missing_name(actual: IfaceFlags, required: IfaceFlags) -> Option<&'static str> {
        let missing = required.difference(actual);
        (!missing.is_empty()).then(|| missing.first_name())
    }
}

bitflags! {
    /// Memory domain capability flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MdFlags: u8 {
        const ALLOC     = 1 << 0;
        const REG       = 1 << 1;
        /// Remote access needs a packed remote key.
        const NEED_RKEY = 1 << 2;
        /// The domain can establish connections from a socket address.
        const SOCKADDR  = 1 << 3;
    }
}

const MD_FLAG_NAMES: [&str; 4] = [
    "memory allocation",
    "memory registration",
    "remote key",
    "sockaddr connectivity",
];

impl MdFlags {
    pub fn first_name(self) -> &'static str {
        debug_assert!(!self.is_empty());
        MD_FLAG_NAMES[self.bits().trailing_zeros() as usize]
    }

    pub fn missing_name(actual: MdFlags, required: MdFlags) -> Option<&'static str> {
        let missing = required.difference(actual);
        (!missing.is_empty()).then(|| missing.first_name())
    }
}

bitflags! {
    /// Atomic operations an interface supports, for one width and one
    /// fetching mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AtomicOpFlags: u8 {
        const ADD   = 1 << 0;
        const AND   = 1 << 1;
        const OR    = 1 << 2;
        const XOR   = 1 << 3;
        const SWAP  = 1 << 4;
        const CSWAP = 1 << 5;
    }
}

/// Operation name and the prefix used when describing its fetching variant.
/// Swap and compare-swap are inherently fetching, so they take no prefix.
const ATOMIC_OP_NAMES: [(&str, &str); 6] = [
    ("add", "fetch-"),
    ("and", "fetch-"),
    ("or", "fetch-"),
    ("xor", "fetch-"),
    ("swap", ""),
    ("cswap", ""),
];

impl AtomicOpFlags {
    /// All operations.
    pub const FULL: AtomicOpFlags = AtomicOpFlags::all();

    /// Describe the first operation in `required` that `actual` lacks, e.g.
    /// "64-bit atomic fetch-add".
    pub fn missing_desc(
        actual: AtomicOpFlags,
        required: AtomicOpFlags,
        width: u8,
        fetch: bool,
    ) -> Option<String> {
        let missing = required.difference(actual);
        if missing.is_empty() {
            return None;
        }
        let (name, prefix) = ATOMIC_OP_NAMES[missing.bits().trailing_zeros() as usize];
        let prefix = if fetch { prefix } else { "" };
        Some(format!("{width}-bit atomic {prefix}{name}"))
    }
}

/// Atomic capabilities grouped by width and fetching mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AtomicCaps {
    /// 32-bit non-fetching operations.
    pub op32: AtomicOpFlags,
    /// 64-bit non-fetching operations.
    pub op64: AtomicOpFlags,
    /// 32-bit fetching operations.
    pub fop32: AtomicOpFlags,
    /// 64-bit fetching operations.
    pub fop64: AtomicOpFlags,
}

impl AtomicCaps {
    pub fn contains(&self, required: &AtomicCaps) -> bool {
        self.op32.contains(required.op32)
            && self.op64.contains(required.op64)
            && self.fop32.contains(required.fop32)
            && self.fop64.contains(required.fop64)
    }

    /// Description of the first required operation this set lacks.
    /// Checked in width order, non-fetching before fetching.
    pub fn first_missing(&self, required: &AtomicCaps) -> Option<String> {
        AtomicOpFlags::missing_desc(self.op32, required.op32, 32, false)
            .or_else(|| AtomicOpFlags::missing_desc(self.op64, required.op64, 64, false))
            .or_else(|| AtomicOpFlags::missing_desc(self.fop32, required.fop32, 32, true))
            .or_else(|| AtomicOpFlags::missing_desc(self.fop64, required.fop64, 64, true))
    }

    pub fn is_empty(&self) -> bool {
        self.op32.is_empty()
            && self.op64.is_empty()
            && self.fop32.is_empty()
            && self.fop64.is_empty()
    }
}

bitflags! {
    /// Communication features requested when the context was created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Features: u32 {
        const RMA    = 1 << 0;
        const AMO32  = 1 << 1;
        const AMO64  = 1 << 2;
        const TAG    = 1 << 3;
        const STREAM = 1 << 4;
        const AM     = 1 << 5;
        const WAKEUP = 1 << 6;
    }
}

bitflags! {
    /// Resource-class flags on a local transport resource.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RscFlags: u8 {
        /// Usable only as an auxiliary (wireup-message) transport.
        const AUX = 1 << 0;
    }
}

bitflags! {
    /// Flags steering endpoint creation, threaded through lane selection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EpInitFlags: u8 {
        /// Endpoint exists solely to stage copies across memory types.
        const MEM_TYPE       = 1 << 0;
        /// An active-message lane must be created (set by selection itself
        /// when RMA or AMO falls back to emulation over active messages).
        const CREATE_AM_LANE = 1 << 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iface_flag_names_cover_all_bits() {
        let highest = IfaceFlags::all().bits();
        assert_eq!(64 - highest.leading_zeros() as usize, IFACE_FLAG_NAMES.len());
        for bit in 0..IFACE_FLAG_NAMES.len() {
            let flag = IfaceFlags::from_bits(1 << bit).unwrap();
            assert!(!flag.first_name().is_empty());
        }
    }

    #[test]
    fn test_iface_missing_name() {
        let actual = IfaceFlags::AM_BCOPY | IfaceFlags::PENDING;
        let required = IfaceFlags::AM_BCOPY | IfaceFlags::CB_SYNC | IfaceFlags::PENDING;
        assert_eq!(
            IfaceFlags::missing_name(actual, required),
            Some("sync callback")
        );
        assert_eq!(IfaceFlags::missing_name(required, required), None);
    }

    #[test]
    fn test_iface_missing_name_reports_lowest_bit() {
        let required = IfaceFlags::PUT_SHORT | IfaceFlags::GET_BCOPY;
        assert_eq!(
            IfaceFlags::missing_name(IfaceFlags::empty(), required),
            Some("put short")
        );
    }

    #[test]
    fn test_md_missing_name() {
        assert_eq!(
            MdFlags::missing_name(MdFlags::ALLOC, MdFlags::REG),
            Some("memory registration")
        );
        assert_eq!(MdFlags::missing_name(MdFlags::REG, MdFlags::REG), None);
    }

    #[test]
    fn test_atomic_missing_desc() {
        let actual = AtomicOpFlags::ADD;
        let required = AtomicOpFlags::ADD | AtomicOpFlags::CSWAP;
        assert_eq!(
            AtomicOpFlags::missing_desc(actual, required, 64, false),
            Some("64-bit atomic cswap".to_string())
        );
        assert_eq!(
            AtomicOpFlags::missing_desc(actual, AtomicOpFlags::ADD, 64, false),
            None
        );
    }

    #[test]
    fn test_atomic_fetch_prefix() {
        assert_eq!(
            AtomicOpFlags::missing_desc(AtomicOpFlags::empty(), AtomicOpFlags::ADD, 32, true),
            Some("32-bit atomic fetch-add".to_string())
        );
        // swap is inherently fetching, so no prefix even in fetch mode
        assert_eq!(
            AtomicOpFlags::missing_desc(AtomicOpFlags::empty(), AtomicOpFlags::SWAP, 32, true),
            Some("32-bit atomic swap".to_string())
        );
    }

    #[test]
    fn test_atomic_caps_contains() {
        let have = AtomicCaps {
            op32: AtomicOpFlags::FULL,
            op64: AtomicOpFlags::FULL,
            fop32: AtomicOpFlags::FULL,
            fop64: AtomicOpFlags::FULL,
        };
        let need = AtomicCaps {
            op64: AtomicOpFlags::ADD,
            ..Default::default()
        };
        assert!(have.contains(&need));
        assert!(!need.contains(&have));
        assert!(need.first_missing(&have).is_some());
        assert_eq!(have.first_missing(&need), None);
    }

    #[test]
    fn test_atomic_caps_empty() {
        assert!(AtomicCaps::default().is_empty());
        let caps = AtomicCaps {
            fop64: AtomicOpFlags::SWAP,
            ..Default::default()
        };
        assert!(!caps.is_empty());
    }

    #[test]
    fn test_recv_event_composites() {
        assert!(IfaceFlags::RECV_EVENT_CAPS.contains(IfaceFlags::EVENT_RECV));
        assert!(IfaceFlags::RECV_EVENT_CAPS.contains(IfaceFlags::EVENT_RECV_SIG));
        assert_eq!(IfaceFlags::UNSIG_EVENT_CAPS, IfaceFlags::EVENT_RECV);
    }
}
