//! Single-shot selections outside the main lane search: the auxiliary
//! transport that carries wireup messages before any lane exists, and the
//! sockaddr transport a client connects through.

use crate::address::AddressEntry;
use crate::caps::MdFlags;
use crate::error::{Result, WeaveError};
use crate::types::ResourceIndex;
use crate::worker::{EpParams, Worker};

use super::criteria::Criteria;
use super::select::{select_transport, SelectInfo};

/// Select the auxiliary transport used to exchange wireup messages with the
/// peer before the endpoint's own lanes exist.
///
/// Auxiliary-only resources are eligible here and nowhere else. Failure is
/// fatal for endpoint creation: without it the address exchange cannot run.
pub fn select_aux_transport(
    worker: &Worker,
    params: &EpParams,
    address_list: &[AddressEntry],
) -> Result<SelectInfo> {
    let criteria = Criteria::aux(params);
    select_transport(
        worker,
        address_list,
        &criteria,
        u64::MAX,
        u64::MAX,
        u64::MAX,
        u64::MAX,
        true,
    )
}

/// Select the transport a client-side sockaddr endpoint connects through.
///
/// Walks the worker's sockaddr transports in priority order and returns the
/// first able to reach the remote address. The remote side is a socket
/// address, not a packed worker address, so no remote entries are consulted;
/// we rely on the server having the chosen transport available as well.
pub fn select_sockaddr_transport(worker: &Worker, params: &EpParams) -> Result<ResourceIndex> {
    let sockaddr = params.sockaddr.as_ref().ok_or_else(|| {
        WeaveError::invalid_param("sockaddr endpoint requires a remote socket address")
    })?;

    for &rsc_index in &worker.sockaddr_tls {
        let resource = worker.resource(rsc_index);
        debug_assert!(
            resource.md.flags.contains(MdFlags::SOCKADDR),
            "{resource} listed as sockaddr transport without sockaddr support"
        );

        if worker.is_sockaddr_accessible(rsc_index, sockaddr) {
            tracing::debug!(tl = %resource, "sockaddr transport selected");
            return Ok(rsc_index);
        }
        tracing::debug!(tl = %resource, %sockaddr, "cannot reach remote sockaddr");
    }

    Err(WeaveError::unreachable(
        "sockaddr",
        format!(
            "none of {} sockaddr transports can reach {sockaddr}",
            worker.sockaddr_tls.len()
        ),
    ))
}
