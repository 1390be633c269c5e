//! Wireup lane selection.
//!
//! Given the local worker's transport resources and the unpacked address
//! list of a remote worker, decide which transport lanes a new endpoint will
//! use for each class of operation. Selection is a fixed sequence of role
//! passes over a shared lane table, finalized into an endpoint configuration
//! key. The whole call is synchronous, deterministic, and performs no I/O.

mod aux;
mod criteria;
mod finalize;
mod lanes;
mod passes;
mod select;

pub use aux::{select_aux_transport, select_sockaddr_transport};
pub use finalize::{EpConfigKey, KeyLane, SelectResult};
pub use select::SelectInfo;

use crate::address::AddressEntry;
use crate::caps::EpInitFlags;
use crate::error::{Result, WeaveError};
use crate::types::MAX_LANES;
use crate::worker::{EpParams, Worker};

use lanes::LaneDesc;

/// State shared by the role passes while selecting lanes for one endpoint.
pub(crate) struct SelectContext<'a> {
    pub worker: &'a Worker,
    pub params: &'a EpParams,
    pub ep_init_flags: EpInitFlags,
    pub address_list: &'a [AddressEntry],
    pub lanes: [LaneDesc; MAX_LANES],
    pub num_lanes: usize,
    /// Whether RMA/AMO may fall back to emulation over active messages.
    pub allow_am: bool,
    /// Selection info of the active-message lane, consulted by the TAG pass.
    pub am_info: SelectInfo,
}

impl<'a> SelectContext<'a> {
    fn new(
        worker: &'a Worker,
        params: &'a EpParams,
        ep_init_flags: EpInitFlags,
        address_list: &'a [AddressEntry],
    ) -> Self {
        // Emulation over active messages lacks a keep-alive protocol, so it
        // cannot satisfy peer error handling; memory-type copy endpoints
        // never emulate.
        let allow_am =
            !ep_init_flags.contains(EpInitFlags::MEM_TYPE) && !params.is_err_mode_peer();
        Self {
            worker,
            params,
            ep_init_flags,
            address_list,
            lanes: [LaneDesc::default(); MAX_LANES],
            num_lanes: 0,
            allow_am,
            am_info: SelectInfo::default(),
        }
    }

    /// Run the role passes in their required order. Later passes depend on
    /// lane-table state from earlier ones: AM must see the lanes that force
    /// wireup messaging, and AM-BW excludes the already-selected AM lane.
    fn search_lanes(&mut self) -> Result<()> {
        self.add_rma_lanes()?;
        self.add_amo_lanes()?;
        self.add_am_lane()?;
        self.add_rma_bw_lanes()?;
        self.add_tag_lane()?;
        self.add_am_bw_lanes()?;

        if self.num_lanes == 0 {
            let features = self.worker.config.features;
            tracing::warn!(?features, "no transports selected");
            return Err(WeaveError::unreachable(
                "usable",
                format!("no transports selected (features: {features:?})"),
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_tests(worker: &'a Worker, params: &'a EpParams) -> Self {
        Self::new(worker, params, EpInitFlags::empty(), &[])
    }
}

/// Select the lanes a new endpoint will use.
///
/// Returns the endpoint configuration key, the mapping from lane to remote
/// address index, and the possibly-augmented endpoint init flags
/// (`CREATE_AM_LANE` is set when RMA or AMO selection fell back to emulation
/// over active messages).
///
/// Fails with `Unreachable` when a mandatory pass finds no candidate or no
/// lane is selected at all, and with `InvalidParam` when the inputs exceed
/// the selector's fixed bitmap widths.
pub fn select_lanes(
    worker: &Worker,
    params: &EpParams,
    ep_init_flags: EpInitFlags,
    address_list: &[AddressEntry],
) -> Result<SelectResult> {
    if worker.resources.len() > 64 {
        return Err(WeaveError::invalid_param(format!(
            "{} local resources exceed the 64-resource bitmap",
            worker.resources.len()
        )));
    }
    if address_list.len() > 64 {
        return Err(WeaveError::invalid_param(format!(
            "{} remote address entries exceed the 64-entry bitmap",
            address_list.len()
        )));
    }

    let mut ctx = SelectContext::new(worker, params, ep_init_flags, address_list);
    ctx.search_lanes()?;
    Ok(ctx.construct_lanes())
}
