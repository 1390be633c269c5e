//! Wireup lane selection for heterogeneous communication transports.
//!
//! Between a high-level messaging API and low-level transports sits the
//! question this crate answers: given everything the local worker can do and
//! a packed description of what the remote worker can do, which concrete
//! transport lanes should a new endpoint use for active messages, remote
//! memory access, atomics, tag matching, and bulk transfers?
//!
//! The answer is computed by [`select_lanes`]: a fixed sequence of role
//! passes over capability bitmasks and latency/bandwidth scores, producing
//! an [`EpConfigKey`] that the endpoint layer instantiates. Selection is
//! deterministic, synchronous, and free of I/O; transports participate only
//! through their attribute records and reachability predicates.

pub mod address;
pub mod caps;
pub mod config;
pub mod error;
pub mod resource;
pub mod score;
pub mod types;
pub mod wireup;
pub mod worker;

pub use address::{AddressEntry, RemoteIfaceAttr, PACKED_IFACE_FLAGS};
pub use caps::{AtomicCaps, AtomicOpFlags, EpInitFlags, Features, IfaceFlags, MdFlags, RscFlags};
pub use config::WeaveConfig;
pub use error::{Result, WeaveError};
pub use resource::{IfaceAttr, LinearCost, MdAttr, Resource};
pub use types::{
    is_null_lane, AddressIndex, DeviceIndex, DeviceType, ErrHandlingMode, LaneIndex, MdIndex,
    MemType, ResourceIndex, MAX_LANES, MAX_OP_MDS, NULL_LANE, NULL_RESOURCE,
};
pub use wireup::{
    select_aux_transport, select_lanes, select_sockaddr_transport, EpConfigKey, KeyLane,
    SelectInfo, SelectResult,
};
pub use worker::{CsumReachability, EpParams, Reachability, SockaddrAccess, Worker};
