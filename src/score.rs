//! Scalar scoring functions for candidate `(local resource, remote entry)`
//! pairs. Higher is better; every function is strictly positive whenever its
//! inputs are physically sensible (positive bandwidth and overheads).

use std::cmp::Ordering;

use crate::address::RemoteIfaceAttr;
use crate::config::WeaveConfig;
use crate::resource::{IfaceAttr, MdAttr};

/// Message size the RMA score is tuned for.
const RMA_TEST_MSG_SIZE: f64 = 4096.0;

/// Message size the bulk-RMA bandwidth score is tuned for, large enough that
/// registration cost and bandwidth dominate latency.
const RMA_BW_TEST_MSG_SIZE: f64 = 262144.0;

/// Relative tolerance for score equality.
const SCORE_EPSILON: f64 = 1e-6;

/// Scoring function evaluated for every surviving candidate pair.
pub type ScoreFn = fn(&WeaveConfig, &MdAttr, &IfaceAttr, &RemoteIfaceAttr) -> f64;

/// One-way link latency between the two interfaces. The growth term makes
/// large jobs prefer transports whose latency does not scale with fanout.
pub(crate) fn link_latency(cfg: &WeaveConfig, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    local.latency.overhead.max(remote.lat_ovh) + local.latency.growth * f64::from(cfg.est_num_eps)
}

/// Best end-to-end latency for small messages.
pub fn am_score(cfg: &WeaveConfig, _md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    1e-3 / (link_latency(cfg, local, remote) + local.overhead + remote.overhead)
}

/// Best for 4 KiB remote memory access.
pub fn rma_score(cfg: &WeaveConfig, _md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    1e-3
        / (link_latency(cfg, local, remote)
            + local.overhead
            + RMA_TEST_MSG_SIZE / local.bandwidth.min(remote.bandwidth))
}

/// Best one-sided latency.
pub fn amo_score(cfg: &WeaveConfig, _md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    1e-3 / (link_latency(cfg, local, remote) + local.overhead)
}

/// Highest bandwidth with lowest overhead for bulk transfers. Scores the
/// transfer time of a 256 KiB message, including memory registration cost.
pub fn rma_bw_score(cfg: &WeaveConfig, md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    1.0 / (RMA_BW_TEST_MSG_SIZE / local.bandwidth.min(remote.bandwidth)
        + link_latency(cfg, local, remote)
        + local.overhead
        + md.reg_cost.overhead
        + RMA_BW_TEST_MSG_SIZE * md.reg_cost.growth)
}

/// Best single-MTU bandwidth for eager active messages.
pub fn am_bw_score(cfg: &WeaveConfig, _md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    let size = local.am_max_bcopy as f64;
    let time = size / local.bandwidth.min(remote.bandwidth)
        + local.overhead
        + remote.overhead
        + link_latency(cfg, local, remote);
    size / time * 1e-5
}

/// Score for auxiliary (wireup message) transports: best end-to-end latency.
pub fn aux_score(cfg: &WeaveConfig, md: &MdAttr, local: &IfaceAttr, remote: &RemoteIfaceAttr) -> f64 {
    am_score(cfg, md, local, remote)
}

/// Compare two scores with a relative epsilon: scores within
/// `SCORE_EPSILON * max(|a|, |b|, 1)` of each other are equal.
pub fn score_cmp(a: f64, b: f64) -> Ordering {
    let eps = SCORE_EPSILON * a.abs().max(b.abs()).max(1.0);
    if (a - b).abs() < eps {
        Ordering::Equal
    } else if a > b {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::LinearCost;

    fn iface(lat_ovh: f64, growth: f64, overhead: f64, bw: f64) -> IfaceAttr {
        IfaceAttr {
            overhead,
            bandwidth: bw,
            latency: LinearCost::new(lat_ovh, growth),
            am_max_bcopy: 8192,
            ..Default::default()
        }
    }

    fn remote(lat_ovh: f64, overhead: f64, bw: f64) -> RemoteIfaceAttr {
        RemoteIfaceAttr {
            overhead,
            bandwidth: bw,
            lat_ovh,
            ..Default::default()
        }
    }

    #[test]
    fn test_link_latency_takes_max_of_overheads() {
        let cfg = WeaveConfig::default();
        let local = iface(2e-6, 0.0, 0.0, 1e9);
        let rem = remote(5e-6, 0.0, 1e9);
        assert_eq!(link_latency(&cfg, &local, &rem), 5e-6);
    }

    #[test]
    fn test_latency_growth_penalizes_large_jobs() {
        let mut cfg = WeaveConfig::default();
        let scalable = iface(1e-6, 0.0, 1e-7, 1e10);
        let fanout = iface(1e-6, 1e-8, 1e-7, 1e10);
        let rem = remote(1e-6, 1e-7, 1e10);
        let md = MdAttr::default();

        cfg.est_num_eps = 1;
        assert!(score_cmp(am_score(&cfg, &md, &fanout, &rem), am_score(&cfg, &md, &scalable, &rem)).is_le());

        cfg.est_num_eps = 100_000;
        assert_eq!(
            score_cmp(am_score(&cfg, &md, &fanout, &rem), am_score(&cfg, &md, &scalable, &rem)),
            Ordering::Less
        );
    }

    #[test]
    fn test_rma_score_prefers_bandwidth_at_4k() {
        let cfg = WeaveConfig::default();
        let md = MdAttr::default();
        let slow = iface(1e-6, 0.0, 1e-7, 1e8);
        let fast = iface(1e-6, 0.0, 1e-7, 1e10);
        let rem = remote(1e-6, 1e-7, 1e10);
        assert_eq!(
            score_cmp(rma_score(&cfg, &md, &fast, &rem), rma_score(&cfg, &md, &slow, &rem)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_rma_bw_score_counts_registration_cost() {
        let cfg = WeaveConfig::default();
        let local = iface(1e-6, 0.0, 1e-7, 1e10);
        let rem = remote(1e-6, 1e-7, 1e10);
        let cheap = MdAttr {
            reg_cost: LinearCost::new(1e-8, 0.0),
            ..Default::default()
        };
        let expensive = MdAttr {
            reg_cost: LinearCost::new(1e-3, 1e-9),
            ..Default::default()
        };
        assert_eq!(
            score_cmp(
                rma_bw_score(&cfg, &cheap, &local, &rem),
                rma_bw_score(&cfg, &expensive, &local, &rem)
            ),
            Ordering::Greater
        );
    }

    #[test]
    fn test_amo_score_ignores_remote_overhead() {
        let cfg = WeaveConfig::default();
        let md = MdAttr::default();
        let local = iface(1e-6, 0.0, 1e-7, 1e10);
        let quiet = remote(1e-6, 1e-7, 1e10);
        let busy = remote(1e-6, 1e-3, 1e10);
        assert_eq!(
            score_cmp(
                amo_score(&cfg, &md, &local, &quiet),
                amo_score(&cfg, &md, &local, &busy)
            ),
            Ordering::Equal
        );
    }

    #[test]
    fn test_scores_positive() {
        let cfg = WeaveConfig::default();
        let md = MdAttr {
            reg_cost: LinearCost::new(1e-8, 1e-11),
            ..Default::default()
        };
        let local = iface(1e-6, 1e-9, 1e-7, 1e9);
        let rem = remote(1e-6, 1e-7, 1e9);
        let fns: [ScoreFn; 6] = [am_score, rma_score, amo_score, rma_bw_score, am_bw_score, aux_score];
        for f in fns {
            assert!(f(&cfg, &md, &local, &rem) > 0.0);
        }
    }

    #[test]
    fn test_score_cmp_relative_epsilon() {
        assert_eq!(score_cmp(1.0, 1.0 + 1e-9), Ordering::Equal);
        assert_eq!(score_cmp(1.0, 1.1), Ordering::Less);
        assert_eq!(score_cmp(1.1, 1.0), Ordering::Greater);
        // relative, not absolute: large scores tolerate larger differences
        assert_eq!(score_cmp(1e9, 1e9 + 1.0), Ordering::Equal);
        assert_eq!(score_cmp(0.0, 0.0), Ordering::Equal);
    }
}
