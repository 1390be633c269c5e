//! The lane descriptor table accumulated across role passes, with the merge
//! rule that reuses an existing lane when the same transport pair is picked
//! for an additional role, and the proxy-lane linking rules.

use bitflags::bitflags;

use crate::types::{AddressIndex, LaneIndex, MdIndex, ResourceIndex, MAX_LANES, NULL_LANE};

use super::select::SelectInfo;
use super::SelectContext;

bitflags! {
    /// Roles a lane may carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct LaneUsage: u8 {
        /// Active messages.
        const AM     = 1 << 0;
        /// High-bandwidth active messages.
        const AM_BW  = 1 << 1;
        /// Remote memory access.
        const RMA    = 1 << 2;
        /// High-bandwidth remote memory access.
        const RMA_BW = 1 << 3;
        /// Atomic memory operations.
        const AMO    = 1 << 4;
        /// Tag matching offload.
        const TAG    = 1 << 5;
    }
}

/// One selected lane, before finalization into the configuration key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LaneDesc {
    pub rsc_index: ResourceIndex,
    pub addr_index: AddressIndex,
    /// For proxy lanes, the lane whose transport actually carries traffic;
    /// the lane's own index denotes a self-proxy. `NULL_LANE` otherwise.
    pub proxy_lane: LaneIndex,
    /// Remote memory domain this lane targets.
    pub dst_md_index: MdIndex,
    pub usage: LaneUsage,
    pub am_bw_score: f64,
    pub rma_score: f64,
    pub rma_bw_score: f64,
    pub amo_score: f64,
}

impl Default for LaneDesc {
    fn default() -> Self {
        Self {
            rsc_index: 0,
            addr_index: 0,
            proxy_lane: NULL_LANE,
            dst_md_index: 0,
            usage: LaneUsage::empty(),
            am_bw_score: 0.0,
            rma_score: 0.0,
            rma_bw_score: 0.0,
            amo_score: 0.0,
        }
    }
}

impl LaneDesc {
    fn set_scores(&mut self, info: &SelectInfo, usage: LaneUsage) {
        if usage.contains(LaneUsage::AM_BW) {
            self.am_bw_score = info.score;
        }
        if usage.contains(LaneUsage::RMA) {
            self.rma_score = info.score;
        }
        if usage.contains(LaneUsage::RMA_BW) {
            self.rma_bw_score = info.score;
        }
        if usage.contains(LaneUsage::AMO) {
            self.amo_score = info.score;
        }
    }
}

impl SelectContext<'_> {
    /// Add a lane for `usage`, reusing an existing lane selected on the same
    /// transport pair where the rules allow.
    ///
    /// Panics if the same pair is added twice with overlapping usage, or
    /// with diverging remote memory domains. Those are programming errors in
    /// the role passes, not runtime conditions.
    pub(crate) fn add_lane(
        &mut self,
        info: &SelectInfo,
        dst_md_index: MdIndex,
        usage: LaneUsage,
        is_proxy: bool,
    ) {
        let mut proxy_target = None;
        let mut proxy_changed = false;

        for lane in 0..self.num_lanes {
            let desc = &mut self.lanes[lane];
            if desc.rsc_index != info.rsc_index || desc.addr_index != info.addr_index {
                continue;
            }
            assert_eq!(
                desc.dst_md_index, dst_md_index,
                "lane[{lane}] selected for a different remote md"
            );
            assert!(
                (desc.usage & usage).is_empty(),
                "lane[{lane}] usage {:?} overlaps {usage:?}",
                desc.usage
            );
            if is_proxy && desc.proxy_lane == NULL_LANE {
                // The new lane is a proxy and an existing non-proxy lane uses
                // the same pair; the proxy points at it.
                proxy_target = Some(lane);
                break;
            } else if !is_proxy && desc.proxy_lane == lane {
                // The existing lane is a self-proxy; repoint it at the real
                // lane we are about to append.
                desc.proxy_lane = self.num_lanes;
                proxy_changed = true;
            } else if !is_proxy && desc.proxy_lane == NULL_LANE {
                // Plain merge: extend the existing lane's roles.
                assert!(!proxy_changed);
                desc.usage |= usage;
                desc.set_scores(info, usage);
                return;
            }
        }

        assert!(self.num_lanes < MAX_LANES, "lane table overflow");
        let proxy_lane = match proxy_target {
            Some(lane) => lane,
            None if is_proxy => self.num_lanes, // self-proxy
            None => NULL_LANE,
        };

        let desc = &mut self.lanes[self.num_lanes];
        *desc = LaneDesc {
            rsc_index: info.rsc_index,
            addr_index: info.addr_index,
            proxy_lane,
            dst_md_index,
            usage,
            ..Default::default()
        };
        desc.set_scores(info, usage);
        self.num_lanes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeaveConfig;
    use crate::worker::{EpParams, Worker};

    fn ctx_fixture() -> (Worker, EpParams) {
        (Worker::new(WeaveConfig::default(), Vec::new()), EpParams::default())
    }

    fn info(rsc_index: usize, addr_index: usize, score: f64) -> SelectInfo {
        SelectInfo {
            rsc_index,
            addr_index,
            score,
        }
    }

    #[test]
    fn test_distinct_pairs_append() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::RMA, false);
        ctx.add_lane(&info(1, 1, 2.0), 1, LaneUsage::RMA, false);
        assert_eq!(ctx.num_lanes, 2);
        assert_eq!(ctx.lanes[0].rma_score, 1.0);
        assert_eq!(ctx.lanes[1].rma_score, 2.0);
        assert_eq!(ctx.lanes[0].proxy_lane, NULL_LANE);
    }

    #[test]
    fn test_same_pair_merges_usage() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::RMA, false);
        ctx.add_lane(&info(0, 0, 3.0), 0, LaneUsage::AMO, false);
        assert_eq!(ctx.num_lanes, 1);
        assert_eq!(ctx.lanes[0].usage, LaneUsage::RMA | LaneUsage::AMO);
        assert_eq!(ctx.lanes[0].rma_score, 1.0);
        assert_eq!(ctx.lanes[0].amo_score, 3.0);
    }

    #[test]
    #[should_panic(expected = "overlaps")]
    fn test_overlapping_usage_panics() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::RMA, false);
        ctx.add_lane(&info(0, 0, 2.0), 0, LaneUsage::RMA, false);
    }

    #[test]
    fn test_proxy_without_partner_is_self_proxy() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::AM, true);
        assert_eq!(ctx.num_lanes, 1);
        assert_eq!(ctx.lanes[0].proxy_lane, 0);
    }

    #[test]
    fn test_proxy_links_to_existing_real_lane() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::RMA, false);
        ctx.add_lane(&info(0, 0, 2.0), 0, LaneUsage::AM, true);
        assert_eq!(ctx.num_lanes, 2);
        assert_eq!(ctx.lanes[1].proxy_lane, 0);
        assert_eq!(ctx.lanes[0].proxy_lane, NULL_LANE);
    }

    #[test]
    fn test_real_lane_repoints_existing_self_proxy() {
        let (worker, params) = ctx_fixture();
        let mut ctx = SelectContext::for_tests(&worker, &params);
        ctx.add_lane(&info(0, 0, 1.0), 0, LaneUsage::AM, true);
        ctx.add_lane(&info(0, 0, 2.0), 0, LaneUsage::RMA, false);
        assert_eq!(ctx.num_lanes, 2);
        // The original self-proxy now points at the appended real lane.
        assert_eq!(ctx.lanes[0].proxy_lane, 1);
        assert_eq!(ctx.lanes[1].proxy_lane, NULL_LANE);
    }
}
