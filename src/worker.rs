//! The worker-side view lane selection runs against: local resources,
//! enablement bitmaps, and the predicates supplied by the transport layer.

use std::net::SocketAddr;

use crate::address::AddressEntry;
use crate::config::WeaveConfig;
use crate::resource::Resource;
use crate::types::{bit, ErrHandlingMode, MemType, ResourceIndex};

/// Decides whether a local resource can address a remote entry.
///
/// Supplied by the transport layer. The default implementation matches
/// transport-name checksums, which is sufficient when both workers see the
/// same fabric; real transports also consult device addresses.
pub trait Reachability {
    fn is_reachable(&self, resource: &Resource, remote: &AddressEntry) -> bool;
}

impl<F> Reachability for F
where
    F: Fn(&Resource, &AddressEntry) -> bool,
{
    fn is_reachable(&self, resource: &Resource, remote: &AddressEntry) -> bool {
        self(resource, remote)
    }
}

/// Default reachability: the remote entry was produced by the same transport.
#[derive(Debug, Default)]
pub struct CsumReachability;

impl Reachability for CsumReachability {
    fn is_reachable(&self, resource: &Resource, remote: &AddressEntry) -> bool {
        resource.tl_name_csum() == remote.tl_name_csum
    }
}

/// Decides whether a resource's memory domain can connect to a remote socket
/// address. Only consulted for resources in the sockaddr priority list.
pub trait SockaddrAccess {
    fn is_accessible(&self, resource: &Resource, remote: &SocketAddr) -> bool;
}

impl<F> SockaddrAccess for F
where
    F: Fn(&Resource, &SocketAddr) -> bool,
{
    fn is_accessible(&self, resource: &Resource, remote: &SocketAddr) -> bool {
        self(resource, remote)
    }
}

#[derive(Debug, Default)]
struct NoSockaddrAccess;

impl SockaddrAccess for NoSockaddrAccess {
    fn is_accessible(&self, _resource: &Resource, _remote: &SocketAddr) -> bool {
        false
    }
}

/// Per-endpoint creation parameters.
#[derive(Debug, Clone, Default)]
pub struct EpParams {
    pub err_mode: ErrHandlingMode,
    /// Remote socket address for client-side sockaddr endpoints.
    pub sockaddr: Option<SocketAddr>,
}

impl EpParams {
    pub fn is_err_mode_peer(&self) -> bool {
        self.err_mode == ErrHandlingMode::Peer
    }
}

/// Everything lane selection needs to know about the local worker.
///
/// Resources and bitmaps are read-only for the duration of a selection call;
/// the selector holds only borrows.
pub struct Worker {
    pub config: WeaveConfig,
    pub resources: Vec<Resource>,

    /// Resources enabled for selection at all.
    pub tl_bitmap: u64,

    /// Resources explicitly designated for atomics, even if peer-to-peer.
    pub atomic_tls: u64,

    /// Per memory type, the resources able to access that memory. A zero
    /// bitmap means the worker has no access transports for the type.
    pub mem_type_tls: [u64; MemType::COUNT],

    /// Sockaddr-capable resources in decreasing priority order.
    pub sockaddr_tls: Vec<ResourceIndex>,

    reachability: Box<dyn Reachability>,
    sockaddr_access: Box<dyn SockaddrAccess>,
}

impl Worker {
    /// Build a worker view over `resources`, all enabled, with host memory
    /// accessible through every resource and checksum-based reachability.
    pub fn new(config: WeaveConfig, resources: Vec<Resource>) -> Self {
        let tl_bitmap = if resources.len() >= 64 {
            u64::MAX
        } else {
            (1u64 << resources.len()) - 1
        };
        let mut mem_type_tls = [0u64; MemType::COUNT];
        mem_type_tls[MemType::Host as usize] = tl_bitmap;
        Self {
            config,
            resources,
            tl_bitmap,
            atomic_tls: 0,
            mem_type_tls,
            sockaddr_tls: Vec::new(),
            reachability: Box::new(CsumReachability),
            sockaddr_access: Box::new(NoSockaddrAccess),
        }
    }

    pub fn set_reachability(&mut self, reachability: impl Reachability + 'static) {
        self.reachability = Box::new(reachability);
    }

    pub fn set_sockaddr_access(&mut self, access: impl SockaddrAccess + 'static) {
        self.sockaddr_access = Box::new(access);
    }

    pub(crate) fn resource(&self, rsc_index: ResourceIndex) -> &Resource {
        &self.resources[rsc_index]
    }

    pub(crate) fn is_reachable(&self, rsc_index: ResourceIndex, remote: &AddressEntry) -> bool {
        self.reachability
            .is_reachable(&self.resources[rsc_index], remote)
    }

    pub(crate) fn is_sockaddr_accessible(
        &self,
        rsc_index: ResourceIndex,
        remote: &SocketAddr,
    ) -> bool {
        self.sockaddr_access
            .is_accessible(&self.resources[rsc_index], remote)
    }

    pub(crate) fn is_tl_enabled(&self, rsc_index: ResourceIndex) -> bool {
        self.tl_bitmap & bit(rsc_index) != 0
    }

    pub fn is_tl_p2p(&self, rsc_index: ResourceIndex) -> bool {
        self.resources[rsc_index].is_p2p()
    }

    /// Recover a transport name from a remote entry's checksum, for
    /// diagnostics. Returns the first local transport with a matching name
    /// checksum, if any.
    pub fn tl_name_by_csum(&self, csum: u16) -> Option<&str> {
        self.resources
            .iter()
            .find(|r| r.tl_name_csum() == csum)
            .map(|r| r.tl_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{IfaceFlags, RscFlags};
    use crate::resource::{IfaceAttr, MdAttr};
    use crate::types::DeviceType;

    fn resource(tl: &str) -> Resource {
        Resource {
            tl_name: tl.to_string(),
            dev_name: "dev0".to_string(),
            md_index: 0,
            dev_index: 0,
            dev_type: DeviceType::Net,
            flags: RscFlags::empty(),
            iface: IfaceAttr {
                caps: IfaceFlags::CONNECT_TO_IFACE,
                ..Default::default()
            },
            md: MdAttr::default(),
        }
    }

    fn mirror(rsc: &Resource) -> AddressEntry {
        AddressEntry {
            md_index: rsc.md_index,
            dev_index: rsc.dev_index,
            md_flags: rsc.md.flags,
            tl_name_csum: rsc.tl_name_csum(),
            iface: Default::default(),
        }
    }

    #[test]
    fn test_new_enables_all_resources() {
        let worker = Worker::new(WeaveConfig::default(), vec![resource("rc"), resource("tcp")]);
        assert_eq!(worker.tl_bitmap, 0b11);
        assert!(worker.is_tl_enabled(0));
        assert!(worker.is_tl_enabled(1));
        assert_eq!(worker.mem_type_tls[MemType::Host as usize], 0b11);
        assert_eq!(worker.mem_type_tls[MemType::Cuda as usize], 0);
    }

    #[test]
    fn test_csum_reachability() {
        let worker = Worker::new(WeaveConfig::default(), vec![resource("rc"), resource("tcp")]);
        let entry = mirror(&worker.resources[0]);
        assert!(worker.is_reachable(0, &entry));
        assert!(!worker.is_reachable(1, &entry));
    }

    #[test]
    fn test_closure_reachability() {
        let mut worker = Worker::new(WeaveConfig::default(), vec![resource("rc")]);
        let entry = mirror(&worker.resources[0]);
        worker.set_reachability(|_: &Resource, _: &AddressEntry| false);
        assert!(!worker.is_reachable(0, &entry));
    }

    #[test]
    fn test_tl_name_by_csum() {
        let worker = Worker::new(WeaveConfig::default(), vec![resource("rc"), resource("tcp")]);
        let csum = worker.resources[1].tl_name_csum();
        assert_eq!(worker.tl_name_by_csum(csum), Some("tcp"));
        assert_eq!(worker.tl_name_by_csum(csum.wrapping_add(1)), None);
    }
}
