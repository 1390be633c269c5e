//! Finalization of the lane table into the endpoint configuration key.

use crate::caps::{EpInitFlags, MdFlags};
use crate::resource::Resource;
use crate::types::{
    bit, AddressIndex, ErrHandlingMode, LaneIndex, MdIndex, ResourceIndex, MAX_LANES, MAX_OP_MDS,
    NULL_LANE, NULL_RESOURCE,
};

use super::criteria::Criteria;
use super::lanes::{LaneDesc, LaneUsage};
use super::SelectContext;

/// Per-lane portion of the endpoint configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyLane {
    pub rsc_index: ResourceIndex,
    /// Lane whose transport carries this lane's traffic when the first
    /// message must be sent signaled; the lane's own index for a
    /// self-proxy, `NULL_LANE` for ordinary lanes.
    pub proxy_lane: LaneIndex,
    /// Remote memory domain the lane targets.
    pub dst_md_index: MdIndex,
}

impl Default for KeyLane {
    fn default() -> Self {
        Self {
            rsc_index: NULL_RESOURCE,
            proxy_lane: NULL_LANE,
            dst_md_index: 0,
        }
    }
}

/// The endpoint configuration key: everything the endpoint layer needs to
/// instantiate its lanes. Role arrays hold lane indices in decreasing role
/// score order, padded with `NULL_LANE`.
#[derive(Debug, Clone, PartialEq)]
pub struct EpConfigKey {
    pub num_lanes: usize,
    pub lanes: [KeyLane; MAX_LANES],
    /// The single lane designated for active messages, or `NULL_LANE`.
    pub am_lane: LaneIndex,
    /// The single lane designated for tag matching offload, or `NULL_LANE`.
    pub tag_lane: LaneIndex,
    /// Lane used to exchange wireup messages, or `NULL_LANE` when the AM
    /// lane alone bootstraps the endpoint.
    pub wireup_lane: LaneIndex,
    /// Eager lanes; slot 0 is always the AM lane, the rest sorted by
    /// decreasing single-MTU bandwidth score.
    pub am_bw_lanes: [LaneIndex; MAX_LANES],
    pub rma_lanes: [LaneIndex; MAX_LANES],
    pub rma_bw_lanes: [LaneIndex; MAX_LANES],
    pub amo_lanes: [LaneIndex; MAX_LANES],
    /// Remote memory domains whose keys must be packed for bulk RMA, at most
    /// `MAX_OP_MDS` of them, taken from the fastest bulk lanes.
    pub rma_bw_md_map: u64,
    pub err_mode: ErrHandlingMode,
}

impl Default for EpConfigKey {
    fn default() -> Self {
        Self {
            num_lanes: 0,
            lanes: [KeyLane::default(); MAX_LANES],
            am_lane: NULL_LANE,
            tag_lane: NULL_LANE,
            wireup_lane: NULL_LANE,
            am_bw_lanes: [NULL_LANE; MAX_LANES],
            rma_lanes: [NULL_LANE; MAX_LANES],
            rma_bw_lanes: [NULL_LANE; MAX_LANES],
            amo_lanes: [NULL_LANE; MAX_LANES],
            rma_bw_md_map: 0,
            err_mode: ErrHandlingMode::None,
        }
    }
}

/// Output of a full lane selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectResult {
    pub key: EpConfigKey,
    /// Remote address index each lane connects to; entries past
    /// `key.num_lanes` are unused.
    pub addr_indices: [AddressIndex; MAX_LANES],
    /// Endpoint init flags, possibly augmented with `CREATE_AM_LANE`.
    pub init_flags: EpInitFlags,
}

/// Sort lane indices by decreasing score. `NULL_LANE` scores zero, so real
/// lanes come first; the sort is stable, so equal scores keep lane order.
fn sort_lanes_by(order: &mut [LaneIndex], descs: &[LaneDesc], score: impl Fn(&LaneDesc) -> f64) {
    order.sort_by(|&a, &b| {
        let score_a = if a == NULL_LANE { 0.0 } else { score(&descs[a]) };
        let score_b = if b == NULL_LANE { 0.0 } else { score(&descs[b]) };
        score_b
            .partial_cmp(&score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

impl SelectContext<'_> {
    fn is_rndv_excluded(&self, resource: &Resource) -> bool {
        self.worker
            .config
            .rndv_exclude_tls
            .iter()
            .any(|tl| resource.tl_name.contains(tl.as_str()))
    }

    /// Elect the lane used for wireup messages: the first lane whose local
    /// and remote interfaces both satisfy the auxiliary criteria, else the
    /// last lane on a peer-to-peer transport, else none (the AM lane alone
    /// will bootstrap).
    fn select_wireup_msg_lane(&self) -> LaneIndex {
        let criteria = Criteria::aux(self.params);
        let mut p2p_lane = NULL_LANE;

        for lane in 0..self.num_lanes {
            let desc = &self.lanes[lane];
            let resource = self.worker.resource(desc.rsc_index);
            let ae = &self.address_list[desc.addr_index];
            if resource.iface.caps.contains(criteria.local_iface_flags)
                && ae.iface.caps.contains(criteria.remote_iface_flags)
            {
                return lane;
            } else if resource.is_p2p() {
                p2p_lane = lane;
            }
        }

        p2p_lane
    }

    /// Freeze the lane table into the endpoint configuration key.
    pub(crate) fn construct_lanes(&self) -> SelectResult {
        let mut key = EpConfigKey {
            num_lanes: self.num_lanes,
            err_mode: self.params.err_mode,
            ..Default::default()
        };
        let mut addr_indices = [0usize; MAX_LANES];

        for lane in 0..self.num_lanes {
            let desc = &self.lanes[lane];
            assert!(!desc.usage.is_empty(), "lane[{lane}] has no role");

            key.lanes[lane] = KeyLane {
                rsc_index: desc.rsc_index,
                proxy_lane: desc.proxy_lane,
                dst_md_index: desc.dst_md_index,
            };
            addr_indices[lane] = desc.addr_index;

            if desc.usage.contains(LaneUsage::AM) {
                assert_eq!(key.am_lane, NULL_LANE, "duplicate am lane");
                key.am_lane = lane;
            }
            if desc.usage.contains(LaneUsage::AM_BW) && lane < MAX_LANES - 1 {
                key.am_bw_lanes[lane + 1] = lane;
            }
            if desc.usage.contains(LaneUsage::RMA) {
                key.rma_lanes[lane] = lane;
            }
            if desc.usage.contains(LaneUsage::RMA_BW) {
                key.rma_bw_lanes[lane] = lane;
            }
            if desc.usage.contains(LaneUsage::AMO) {
                key.amo_lanes[lane] = lane;
            }
            if desc.usage.contains(LaneUsage::TAG) {
                assert_eq!(key.tag_lane, NULL_LANE, "duplicate tag lane");
                key.tag_lane = lane;
            }
        }

        // Slot 0 of the eager array is reserved for the AM lane, set below.
        sort_lanes_by(&mut key.am_bw_lanes[1..], &self.lanes, |d| d.am_bw_score);
        sort_lanes_by(&mut key.rma_lanes, &self.lanes, |d| d.rma_score);
        sort_lanes_by(&mut key.rma_bw_lanes, &self.lanes, |d| d.rma_bw_score);
        sort_lanes_by(&mut key.amo_lanes, &self.lanes, |d| d.amo_score);

        key.wireup_lane = self.select_wireup_msg_lane();

        // Keys are packed only for the fastest bulk domains that need them.
        let mut i = 0;
        while i < MAX_LANES
            && key.rma_bw_lanes[i] != NULL_LANE
            && (key.rma_bw_md_map.count_ones() as usize) < MAX_OP_MDS
        {
            let desc = &self.lanes[key.rma_bw_lanes[i]];
            let resource = self.worker.resource(desc.rsc_index);
            let ae = &self.address_list[desc.addr_index];
            if ae.md_flags.contains(MdFlags::NEED_RKEY) && !self.is_rndv_excluded(resource) {
                key.rma_bw_md_map |= bit(desc.dst_md_index);
            }
            i += 1;
        }

        key.am_bw_lanes[0] = key.am_lane;

        SelectResult {
            key,
            addr_indices,
            init_flags: self.ep_init_flags,
        }
    }
}
