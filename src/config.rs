//! Runtime-configurable tuning parameters for lane selection.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `WEAVE_`) or by constructing a custom `WeaveConfig`.

use crate::caps::{AtomicCaps, AtomicOpFlags, Features};

/// Tuning parameters for endpoint lane selection.
#[derive(Debug, Clone)]
pub struct WeaveConfig {
    /// Communication features the context was created with.
    pub features: Features,

    /// Estimated number of endpoints this worker will open. Scales the
    /// per-endpoint latency growth term, penalizing high-fanout transports
    /// in large jobs.
    pub est_num_eps: u32,

    /// Maximum number of lanes used for eager (active message) traffic.
    /// The first eager lane is always the active-message lane.
    pub max_eager_lanes: usize,

    /// Maximum number of lanes used for rendezvous bulk transfers.
    pub max_rndv_lanes: usize,

    /// Non-fetching atomic operations the application may issue.
    pub atomic_ops: AtomicOpFlags,

    /// Fetching atomic operations the application may issue.
    pub atomic_fops: AtomicOpFlags,

    /// Transport names (substring match) whose memory domains are excluded
    /// from the bulk-RMA remote-key map, disabling rendezvous through them.
    pub rndv_exclude_tls: Vec<String>,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            features: Features::empty(),
            est_num_eps: 1,
            max_eager_lanes: 1,
            max_rndv_lanes: 1,
            atomic_ops: AtomicOpFlags::ADD
                | AtomicOpFlags::AND
                | AtomicOpFlags::OR
                | AtomicOpFlags::XOR,
            atomic_fops: AtomicOpFlags::ADD | AtomicOpFlags::SWAP | AtomicOpFlags::CSWAP,
            rndv_exclude_tls: Vec::new(),
        }
    }
}

impl WeaveConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `WEAVE_EST_NUM_EPS`
    /// - `WEAVE_MAX_EAGER_LANES`
    /// - `WEAVE_MAX_RNDV_LANES`
    /// - `WEAVE_RNDV_EXCLUDE_TLS` (comma-separated transport names)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("WEAVE_EST_NUM_EPS") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.est_num_eps = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVE_MAX_EAGER_LANES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.max_eager_lanes = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVE_MAX_RNDV_LANES") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.max_rndv_lanes = n;
            }
        }
        if let Ok(v) = std::env::var("WEAVE_RNDV_EXCLUDE_TLS") {
            cfg.rndv_exclude_tls = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        cfg
    }

    /// Atomic capabilities an endpoint must offer remotely, derived from the
    /// requested features and operation sets. Widths without the matching
    /// feature contribute nothing.
    pub fn atomic_caps(&self) -> AtomicCaps {
        let mut caps = AtomicCaps::default();
        if self.features.contains(Features::AMO32) {
            caps.op32 = self.atomic_ops;
            caps.fop32 = self.atomic_fops;
        }
        if self.features.contains(Features::AMO64) {
            caps.op64 = self.atomic_ops;
            caps.fop64 = self.atomic_fops;
        }
        caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = WeaveConfig::default();
        assert_eq!(cfg.est_num_eps, 1);
        assert_eq!(cfg.max_eager_lanes, 1);
        assert_eq!(cfg.max_rndv_lanes, 1);
        assert!(cfg.rndv_exclude_tls.is_empty());
    }

    #[test]
    fn test_atomic_caps_follow_features() {
        let mut cfg = WeaveConfig::default();
        assert!(cfg.atomic_caps().is_empty());

        cfg.features = Features::AMO64;
        let caps = cfg.atomic_caps();
        assert!(caps.op32.is_empty());
        assert!(caps.fop32.is_empty());
        assert_eq!(caps.op64, cfg.atomic_ops);
        assert_eq!(caps.fop64, cfg.atomic_fops);

        cfg.features = Features::AMO32 | Features::AMO64;
        let caps = cfg.atomic_caps();
        assert_eq!(caps.op32, cfg.atomic_ops);
        assert_eq!(caps.fop32, cfg.atomic_fops);
    }
}
