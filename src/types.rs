/// Index of a local transport resource within the worker's resource list.
pub type ResourceIndex = usize;

/// Index of a memory domain (local or remote, depending on context).
pub type MdIndex = usize;

/// Index of a device within a worker.
pub type DeviceIndex = usize;

/// Index of an entry in a remote worker's unpacked address list.
pub type AddressIndex = usize;

/// Index of a lane within an endpoint configuration.
pub type LaneIndex = usize;

/// Maximum number of lanes an endpoint may use.
pub const MAX_LANES: usize = 8;

/// Maximum number of memory domains a single operation may span.
///
/// Bounds the remote-key map so registration never has to allocate.
pub const MAX_OP_MDS: usize = 4;

/// Sentinel lane index meaning "no lane".
pub const NULL_LANE: LaneIndex = MAX_LANES;

/// Sentinel resource index meaning "no resource".
pub const NULL_RESOURCE: ResourceIndex = usize::MAX;

/// True if `lane` is the "no lane" sentinel.
pub const fn is_null_lane(lane: LaneIndex) -> bool {
    lane == NULL_LANE
}

/// Single-bit mask for an index into a 64-wide bitmap.
pub(crate) const fn bit(index: usize) -> u64 {
    1u64 << index
}

/// Kind of device a transport resource runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DeviceType {
    /// Network interface (RDMA HCA, NIC).
    Net = 0,
    /// Shared memory between processes on the same node.
    Shm = 1,
    /// Loopback to the same worker.
    Loopback = 2,
    /// Accelerator-attached device.
    Acc = 3,
}

impl DeviceType {
    /// True for devices confined to the local node (loopback and shared
    /// memory). No other transport can plausibly beat these for the same
    /// endpoint pair, so multi-lane searches stop once one is selected.
    pub const fn is_node_local(self) -> bool {
        matches!(self, DeviceType::Shm | DeviceType::Loopback)
    }

    pub const fn name(self) -> &'static str {
        match self {
            DeviceType::Net => "net",
            DeviceType::Shm => "shm",
            DeviceType::Loopback => "self",
            DeviceType::Acc => "acc",
        }
    }
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Memory types a context may hold access transports for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MemType {
    Host = 0,
    Cuda = 1,
    CudaManaged = 2,
    Rocm = 3,
}

impl MemType {
    pub const COUNT: usize = 4;

    pub const ALL: [MemType; MemType::COUNT] = [
        MemType::Host,
        MemType::Cuda,
        MemType::CudaManaged,
        MemType::Rocm,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            MemType::Host => "host",
            MemType::Cuda => "cuda",
            MemType::CudaManaged => "cuda-managed",
            MemType::Rocm => "rocm",
        }
    }
}

impl std::fmt::Display for MemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How endpoint errors are surfaced to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrHandlingMode {
    /// No error handling guarantees; peer failure may hang outstanding ops.
    #[default]
    None,
    /// Peer failure is detected and reported on every outstanding operation.
    Peer,
}
