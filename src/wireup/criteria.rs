//! Selection criteria: the requirements one role pass places on candidate
//! transport pairs, plus the scoring function that ranks survivors.

use crate::caps::{AtomicCaps, IfaceFlags, MdFlags, RscFlags};
use crate::score::{aux_score, ScoreFn};
use crate::worker::EpParams;

#[derive(Clone)]
pub(crate) struct Criteria {
    /// Role title used in diagnostics, e.g. "active messages".
    pub title: String,
    pub local_md_flags: MdFlags,
    pub remote_md_flags: MdFlags,
    pub local_iface_flags: IfaceFlags,
    pub remote_iface_flags: IfaceFlags,
    pub local_atomic: AtomicCaps,
    pub remote_atomic: AtomicCaps,
    /// Resource classes this criteria opts into (e.g. auxiliary-only).
    pub rsc_flags: RscFlags,
    pub calc_score: ScoreFn,
}

impl Criteria {
    pub fn new(title: impl Into<String>, calc_score: ScoreFn) -> Self {
        Self {
            title: title.into(),
            local_md_flags: MdFlags::empty(),
            remote_md_flags: MdFlags::empty(),
            local_iface_flags: IfaceFlags::empty(),
            remote_iface_flags: IfaceFlags::empty(),
            local_atomic: AtomicCaps::default(),
            remote_atomic: AtomicCaps::default(),
            rsc_flags: RscFlags::empty(),
            calc_score,
        }
    }

    /// Peer error handling requires every selected interface to detect peer
    /// failures.
    pub fn apply_err_mode(&mut self, params: &EpParams) {
        if params.is_err_mode_peer() {
            self.local_iface_flags |= IfaceFlags::ERRHANDLE_PEER_FAILURE;
        }
    }

    /// Criteria for the auxiliary transport used to exchange wireup
    /// messages: reachable from the interface address alone, buffered active
    /// messages, and an async callback so progress does not depend on the
    /// remote application polling.
    pub fn aux(params: &EpParams) -> Self {
        let mut criteria = Criteria::new("auxiliary", aux_score);
        criteria.local_iface_flags =
            IfaceFlags::CONNECT_TO_IFACE | IfaceFlags::AM_BCOPY | IfaceFlags::PENDING;
        criteria.remote_iface_flags =
            IfaceFlags::CONNECT_TO_IFACE | IfaceFlags::AM_BCOPY | IfaceFlags::CB_ASYNC;
        criteria.rsc_flags = RscFlags::AUX;
        criteria.apply_err_mode(params);
        criteria
    }
}
