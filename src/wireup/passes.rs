//! The role passes: each builds a criteria record for one class of traffic
//! and drives the evaluator, possibly in a multi-lane loop, appending to the
//! shared lane table through the merge primitive.

use crate::caps::{EpInitFlags, Features, IfaceFlags, MdFlags};
use crate::error::Result;
use crate::score::{am_bw_score, am_score, amo_score, rma_bw_score, rma_score, score_cmp};
use crate::types::{bit, MemType, ResourceIndex, MAX_LANES, MAX_OP_MDS};

use super::criteria::Criteria;
use super::lanes::LaneUsage;
use super::select::select_transport;
use super::SelectContext;

/// State of one multi-lane bandwidth search.
struct BwInfo {
    criteria: Criteria,
    local_dev_bitmap: u64,
    remote_dev_bitmap: u64,
    /// Local memory domains already holding a lane.
    md_map: u64,
    usage: LaneUsage,
    max_lanes: usize,
}

impl SelectContext<'_> {
    fn features(&self) -> Features {
        self.worker.config.features
    }

    fn is_mem_type_ep(&self) -> bool {
        self.ep_init_flags.contains(EpInitFlags::MEM_TYPE)
    }

    /// Remove every local resource sharing `rsc_index`'s memory domain from
    /// `tl_bitmap`, so no two lanes go through the same local domain.
    fn unset_tl_by_md(&self, tl_bitmap: u64, rsc_index: ResourceIndex) -> u64 {
        let md_index = self.worker.resource(rsc_index).md_index;
        let mut bitmap = tl_bitmap;
        for (i, rsc) in self.worker.resources.iter().enumerate() {
            if rsc.md_index == md_index {
                bitmap &= !bit(i);
            }
        }
        bitmap
    }

    /// A lane needs a signaled-send proxy when the local transport is not
    /// peer-to-peer and the remote interface wakes only on signaled
    /// messages: the peer may deactivate its interface and sleep until the
    /// first message arrives signaled.
    fn is_lane_proxy(&self, rsc_index: ResourceIndex, remote_caps: IfaceFlags) -> bool {
        !self.worker.is_tl_p2p(rsc_index)
            && (remote_caps & IfaceFlags::RECV_EVENT_CAPS) == IfaceFlags::EVENT_RECV_SIG
    }

    /// Two-phase memory-access selection shared by the RMA and AMO passes.
    ///
    /// The first phase picks the best transport reaching registered remote
    /// memory. Subsequent phases admit transports reaching allocated remote
    /// memory, but only when they strictly beat the registered score: a peer
    /// buffer allocated through a faster domain is worth a dedicated lane,
    /// anything else sticks with the registered path. After every admit the
    /// chosen remote domain and every local resource sharing the chosen
    /// local domain are masked off.
    fn add_memaccess_lanes(
        &mut self,
        criteria: &Criteria,
        tl_bitmap: u64,
        usage: LaneUsage,
    ) -> Result<()> {
        let show_error = !self.allow_am;
        let mut mem_criteria = criteria.clone();
        let mut tl_bitmap = tl_bitmap;
        let mut remote_md_map = u64::MAX;

        mem_criteria.title = criteria.title.replace("{}", "registered");
        mem_criteria.remote_md_flags = criteria.remote_md_flags | MdFlags::REG;
        let first = select_transport(
            self.worker,
            self.address_list,
            &mem_criteria,
            tl_bitmap,
            remote_md_map,
            u64::MAX,
            u64::MAX,
            show_error,
        );
        let first = match first {
            Ok(info) => info,
            Err(err) => {
                if self.allow_am {
                    self.ep_init_flags |= EpInitFlags::CREATE_AM_LANE;
                    return Ok(());
                }
                return Err(err);
            }
        };

        let dst_md_index = self.address_list[first.addr_index].md_index;
        let reg_score = first.score;
        self.add_lane(&first, dst_md_index, usage, false);
        remote_md_map &= !bit(dst_md_index);
        tl_bitmap = self.unset_tl_by_md(tl_bitmap, first.rsc_index);

        mem_criteria.title = criteria.title.replace("{}", "allocated");
        mem_criteria.remote_md_flags = criteria.remote_md_flags | MdFlags::ALLOC;

        while self.num_lanes < MAX_LANES {
            let Ok(info) = select_transport(
                self.worker,
                self.address_list,
                &mem_criteria,
                tl_bitmap,
                remote_md_map,
                u64::MAX,
                u64::MAX,
                false,
            ) else {
                break;
            };
            if score_cmp(info.score, reg_score) != std::cmp::Ordering::Greater {
                break;
            }
            let dst_md_index = self.address_list[info.addr_index].md_index;
            self.add_lane(&info, dst_md_index, usage, false);
            remote_md_map &= !bit(dst_md_index);
            tl_bitmap = self.unset_tl_by_md(tl_bitmap, info.rsc_index);
        }

        Ok(())
    }

    pub(crate) fn add_rma_lanes(&mut self) -> Result<()> {
        if !self.features().contains(Features::RMA) && !self.is_mem_type_ep() {
            return Ok(());
        }

        let mut criteria;
        if self.is_mem_type_ep() {
            // Staging endpoint for cross-memory-type copies: short puts are
            // all it ever issues.
            criteria = Criteria::new("copy across memory types", rma_score);
            criteria.remote_iface_flags = IfaceFlags::PUT_SHORT;
            criteria.local_iface_flags = IfaceFlags::PUT_SHORT;
        } else {
            criteria = Criteria::new("remote {} memory access", rma_score);
            criteria.remote_iface_flags =
                IfaceFlags::PUT_SHORT | IfaceFlags::PUT_BCOPY | IfaceFlags::GET_BCOPY;
            criteria.local_iface_flags = criteria.remote_iface_flags | IfaceFlags::PENDING;
        }
        criteria.apply_err_mode(self.params);

        self.add_memaccess_lanes(&criteria, u64::MAX, LaneUsage::RMA)
    }

    pub(crate) fn add_amo_lanes(&mut self) -> Result<()> {
        if !self
            .features()
            .intersects(Features::AMO32 | Features::AMO64)
            || self.is_mem_type_ep()
        {
            return Ok(());
        }

        let mut criteria = Criteria::new("atomic operations on {} memory", amo_score);
        criteria.remote_atomic = self.worker.config.atomic_caps();
        criteria.local_atomic = criteria.remote_atomic;
        criteria.local_iface_flags = criteria.remote_iface_flags | IfaceFlags::PENDING;
        criteria.apply_err_mode(self.params);

        // Only non-p2p resources, or resources explicitly designated for
        // atomics, are usable: the remote peer must be able to connect back
        // on the same transport.
        let mut tl_bitmap = self.worker.atomic_tls;
        for rsc_index in 0..self.worker.resources.len() {
            if !self.worker.is_tl_p2p(rsc_index) {
                tl_bitmap |= bit(rsc_index);
            }
        }

        self.add_memaccess_lanes(&criteria, tl_bitmap, LaneUsage::AMO)
    }

    /// Active messages are needed for wireup on the configured features, for
    /// sockaddr endpoints, or whenever any selected lane runs on a
    /// peer-to-peer transport (its endpoint addresses travel over AM).
    fn is_am_required(&self) -> bool {
        if self.ep_init_flags.contains(EpInitFlags::CREATE_AM_LANE)
            || self.params.sockaddr.is_some()
        {
            return true;
        }
        if !self.is_mem_type_ep()
            && self
                .features()
                .intersects(Features::TAG | Features::STREAM | Features::AM)
        {
            return true;
        }
        (0..self.num_lanes).any(|lane| self.worker.is_tl_p2p(self.lanes[lane].rsc_index))
    }

    pub(crate) fn add_am_lane(&mut self) -> Result<()> {
        if !self.is_am_required() {
            return Ok(());
        }

        let mut criteria = Criteria::new("active messages", am_score);
        criteria.remote_iface_flags = IfaceFlags::AM_BCOPY | IfaceFlags::CB_SYNC;
        criteria.local_iface_flags = IfaceFlags::AM_BCOPY;
        criteria.apply_err_mode(self.params);

        if self.features().contains(Features::TAG | Features::WAKEUP) {
            criteria.local_iface_flags |= IfaceFlags::UNSIG_EVENT_CAPS;
        }

        // AM failure is fatal: without it neither wireup nor the requested
        // messaging features can work.
        let info = select_transport(
            self.worker,
            self.address_list,
            &criteria,
            u64::MAX,
            u64::MAX,
            u64::MAX,
            u64::MAX,
            true,
        )?;
        self.am_info = info;

        let ae = &self.address_list[info.addr_index];
        let is_proxy = self.is_lane_proxy(info.rsc_index, ae.iface.caps);
        self.add_lane(&info, ae.md_index, LaneUsage::AM, is_proxy);
        Ok(())
    }

    /// Multi-lane bandwidth loop shared by RMA-BW and AM-BW. Diversifies
    /// across local and remote devices and caps the number of distinct local
    /// memory domains at `MAX_OP_MDS` so registration never allocates.
    fn add_bw_lanes(&mut self, bw_info: &BwInfo, allow_proxy: bool, tl_bitmap: u64) {
        let mut num_lanes = 0;
        let mut md_map = bw_info.md_map;
        let mut local_dev_bitmap = bw_info.local_dev_bitmap;
        let mut remote_dev_bitmap = bw_info.remote_dev_bitmap;

        while num_lanes < bw_info.max_lanes
            && (md_map.count_ones() as usize) < MAX_OP_MDS
            && self.num_lanes < MAX_LANES
        {
            let Ok(info) = select_transport(
                self.worker,
                self.address_list,
                &bw_info.criteria,
                tl_bitmap,
                u64::MAX,
                local_dev_bitmap,
                remote_dev_bitmap,
                false,
            ) else {
                break;
            };

            let ae = &self.address_list[info.addr_index];
            let is_proxy = allow_proxy && self.is_lane_proxy(info.rsc_index, ae.iface.caps);
            self.add_lane(&info, ae.md_index, bw_info.usage, is_proxy);

            let resource = self.worker.resource(info.rsc_index);
            md_map |= bit(resource.md_index);
            num_lanes += 1;

            local_dev_bitmap &= !bit(resource.dev_index);
            remote_dev_bitmap &= !bit(ae.dev_index);

            if resource.dev_type.is_node_local() {
                // Loopback or shared memory: no other transport can beat it
                // for this endpoint pair.
                break;
            }
        }
    }

    pub(crate) fn add_rma_bw_lanes(&mut self) -> Result<()> {
        let mut criteria = Criteria::new("high-bw remote memory access", rma_bw_score);
        if self.is_mem_type_ep() {
            // Staging endpoints copy through whatever can move the bytes.
        } else if self.features().contains(Features::TAG) {
            // Rendezvous only ever targets registered remote memory.
            criteria.local_md_flags = MdFlags::REG;
            criteria.remote_md_flags = MdFlags::REG;
        } else {
            return Ok(());
        }

        criteria.remote_iface_flags = IfaceFlags::GET_ZCOPY | IfaceFlags::PUT_ZCOPY;
        criteria.local_iface_flags = criteria.remote_iface_flags | IfaceFlags::PENDING;
        criteria.apply_err_mode(self.params);

        if self.features().contains(Features::TAG | Features::WAKEUP) {
            criteria.local_iface_flags |= IfaceFlags::UNSIG_EVENT_CAPS;
        }

        let bw_info = BwInfo {
            criteria,
            local_dev_bitmap: u64::MAX,
            remote_dev_bitmap: u64::MAX,
            md_map: 0,
            usage: LaneUsage::RMA_BW,
            max_lanes: self.worker.config.max_rndv_lanes,
        };

        for mem_type in MemType::ALL {
            let access_tls = self.worker.mem_type_tls[mem_type as usize];
            if access_tls == 0 {
                continue;
            }
            self.add_bw_lanes(&bw_info, false, access_tls);
        }

        Ok(())
    }

    /// Lane for hardware tag matching offload. Only taken when it beats the
    /// AM lane's score; otherwise tags stay in software over AM.
    pub(crate) fn add_tag_lane(&mut self) -> Result<()> {
        // Hardware tag matching has no peer-failure recovery, so any error
        // handling mode other than none keeps tags in software.
        if !self.features().contains(Features::TAG) || self.params.is_err_mode_peer() {
            return Ok(());
        }

        let mut criteria = Criteria::new("tag offload", am_score);
        // Posting receives to hardware needs registered memory on both ends.
        criteria.local_md_flags = MdFlags::REG;
        criteria.remote_md_flags = MdFlags::REG;
        criteria.local_iface_flags = IfaceFlags::TAG_EAGER_BCOPY
            | IfaceFlags::TAG_RNDV_ZCOPY
            | IfaceFlags::GET_ZCOPY
            | IfaceFlags::PENDING;
        criteria.remote_iface_flags = criteria.local_iface_flags;

        if self.features().contains(Features::WAKEUP) {
            criteria.local_iface_flags |= IfaceFlags::UNSIG_EVENT_CAPS;
        }

        let Ok(info) = select_transport(
            self.worker,
            self.address_list,
            &criteria,
            u64::MAX,
            u64::MAX,
            u64::MAX,
            u64::MAX,
            false,
        ) else {
            return Ok(());
        };

        if score_cmp(info.score, self.am_info.score) == std::cmp::Ordering::Less {
            tracing::trace!(
                tag_score = info.score,
                am_score = self.am_info.score,
                "tag offload loses to active messages, staying in software"
            );
            return Ok(());
        }

        let ae = &self.address_list[info.addr_index];
        let is_proxy = self.is_lane_proxy(info.rsc_index, ae.iface.caps);
        self.add_lane(&info, ae.md_index, LaneUsage::TAG, is_proxy);
        Ok(())
    }

    pub(crate) fn add_am_bw_lanes(&mut self) -> Result<()> {
        if !self.features().contains(Features::TAG)
            || self.is_mem_type_ep()
            || self.worker.config.max_eager_lanes < 2
        {
            return Ok(());
        }

        let mut criteria = Criteria::new("high-bw active messages", am_bw_score);
        criteria.remote_iface_flags = IfaceFlags::AM_BCOPY | IfaceFlags::CB_SYNC;
        criteria.local_iface_flags = IfaceFlags::AM_BCOPY;
        criteria.apply_err_mode(self.params);

        if self.features().contains(Features::TAG | Features::WAKEUP) {
            criteria.local_iface_flags |= IfaceFlags::UNSIG_EVENT_CAPS;
        }

        let mut bw_info = BwInfo {
            criteria,
            local_dev_bitmap: u64::MAX,
            remote_dev_bitmap: u64::MAX,
            md_map: 0,
            usage: LaneUsage::AM_BW,
            max_lanes: self.worker.config.max_eager_lanes - 1,
        };

        // The AM lane is eager lane zero; seed the loop state so it is never
        // re-selected here.
        for lane in 0..self.num_lanes {
            if self.lanes[lane].usage.contains(LaneUsage::AM) {
                let resource = self.worker.resource(self.lanes[lane].rsc_index);
                let ae = &self.address_list[self.lanes[lane].addr_index];
                bw_info.md_map |= bit(resource.md_index);
                bw_info.local_dev_bitmap &= !bit(resource.dev_index);
                bw_info.remote_dev_bitmap &= !bit(ae.dev_index);
                if resource.dev_type.is_node_local() {
                    // Nothing beats a loopback or shared-memory AM lane.
                    return Ok(());
                }
                break;
            }
        }

        self.add_bw_lanes(&bw_info, true, u64::MAX);
        Ok(())
    }
}
