//! The criteria evaluator: find the best `(local resource, remote entry)`
//! pair satisfying a criteria record, or report why none does.

use std::fmt::Write as _;

use crate::address::{AddressEntry, PACKED_IFACE_FLAGS};
use crate::caps::{IfaceFlags, MdFlags, RscFlags};
use crate::error::{Result, WeaveError};
use crate::score::score_cmp;
use crate::types::{bit, AddressIndex, ResourceIndex};
use crate::worker::Worker;

use super::criteria::Criteria;

/// Outcome of one evaluator call: the winning pair and its score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SelectInfo {
    pub rsc_index: ResourceIndex,
    pub addr_index: AddressIndex,
    pub score: f64,
}

/// Bounded reason accumulator, so failed selections can report every
/// rejected resource without allocating on the selection hot path beyond a
/// single fixed-capacity string.
pub(crate) struct ReasonBuf {
    buf: String,
}

impl ReasonBuf {
    const CAP: usize = 256;

    pub fn new() -> Self {
        Self {
            buf: String::with_capacity(Self::CAP),
        }
    }

    /// Append one reason, followed by a separator. Content past the
    /// capacity is dropped.
    pub fn push(&mut self, part: std::fmt::Arguments<'_>) {
        if self.buf.len() >= Self::CAP {
            return;
        }
        let _ = self.buf.write_fmt(part);
        let _ = self.buf.write_str(", ");
        if self.buf.len() > Self::CAP {
            let mut end = Self::CAP;
            while !self.buf.is_char_boundary(end) {
                end -= 1;
            }
            self.buf.truncate(end);
        }
    }

    /// The accumulated reasons with the trailing separator removed.
    pub fn finish(mut self) -> String {
        if self.buf.ends_with(", ") {
            self.buf.truncate(self.buf.len() - 2);
        }
        self.buf
    }
}

/// Name shown for a remote entry whose transport has no local counterpart.
fn remote_tl_name<'a>(worker: &'a Worker, ae: &AddressEntry) -> &'a str {
    worker.tl_name_by_csum(ae.tl_name_csum).unwrap_or("<unknown>")
}

/// Select the best local and remote transport pair for `criteria`.
///
/// `tl_bitmap` restricts the local resources considered; `remote_md_map`,
/// `local_dev_bitmap` and `remote_dev_bitmap` restrict remote memory
/// domains and devices on either side. Multi-lane passes narrow these
/// bitmaps between calls to force diversity.
///
/// Candidates are visited in ascending local resource index, then ascending
/// address index; on equal score the higher summed priority wins, and on
/// equal priority the earliest candidate is kept. This makes selection
/// deterministic for identical inputs.
pub(crate) fn select_transport(
    worker: &Worker,
    address_list: &[AddressEntry],
    criteria: &Criteria,
    tl_bitmap: u64,
    remote_md_map: u64,
    local_dev_bitmap: u64,
    remote_dev_bitmap: u64,
    show_error: bool,
) -> Result<SelectInfo> {
    // Criteria may only require remote flags the address packer transmits.
    debug_assert!(
        PACKED_IFACE_FLAGS.contains(criteria.remote_iface_flags),
        "criteria '{}' requires remote flags that are never packed",
        criteria.title
    );

    let mut reasons = ReasonBuf::new();

    // Phase 1: which remote entries satisfy the criteria.
    let mut addr_index_map = 0u64;
    for (addr_index, ae) in address_list.iter().enumerate() {
        if remote_dev_bitmap & bit(ae.dev_index) == 0 {
            tracing::trace!(addr_index, dev_index = ae.dev_index, "addr not in use, device masked");
            continue;
        }
        if remote_md_map & bit(ae.md_index) == 0 {
            tracing::trace!(addr_index, md_index = ae.md_index, "addr not in use, md masked");
            continue;
        }
        if let Some(missing) = MdFlags::missing_name(ae.md_flags, criteria.remote_md_flags) {
            tracing::trace!(addr_index, tl = remote_tl_name(worker, ae), "no {missing}");
            continue;
        }
        if let Some(missing) = IfaceFlags::missing_name(ae.iface.caps, criteria.remote_iface_flags)
        {
            tracing::trace!(addr_index, tl = remote_tl_name(worker, ae), "no {missing}");
            continue;
        }
        if let Some(missing) = ae.iface.atomic.first_missing(&criteria.remote_atomic) {
            tracing::trace!(addr_index, tl = remote_tl_name(worker, ae), "no {missing}");
            continue;
        }
        addr_index_map |= bit(addr_index);
    }

    if addr_index_map == 0 {
        reasons.push(format_args!("no supported remote address entry"));
        return fail(criteria, reasons, show_error);
    }

    // Phase 2: pick the best local resource that can reach a surviving
    // remote entry.
    let mut best: Option<SelectInfo> = None;
    let mut best_priority = 0u16;

    for (rsc_index, resource) in worker.resources.iter().enumerate() {
        if !worker.is_tl_enabled(rsc_index) {
            continue;
        }
        if resource.flags.contains(RscFlags::AUX) && !criteria.rsc_flags.contains(RscFlags::AUX) {
            continue;
        }

        // Local requirement checks, each reported through the reason buffer.
        let missing = MdFlags::missing_name(resource.md.flags, criteria.local_md_flags)
            .or_else(|| IfaceFlags::missing_name(resource.iface.caps, criteria.local_iface_flags));
        if let Some(flag) = missing {
            tracing::trace!(rsc = %resource, title = %criteria.title, "not suitable, no {flag}");
            reasons.push(format_args!("{resource} - no {flag}"));
            continue;
        }
        if let Some(desc) = resource.iface.atomic.first_missing(&criteria.local_atomic) {
            tracing::trace!(rsc = %resource, title = %criteria.title, "not suitable, no {desc}");
            reasons.push(format_args!("{resource} - no {desc}"));
            continue;
        }

        // Supplied transport and device bitmaps.
        if tl_bitmap & bit(rsc_index) == 0 {
            tracing::trace!(rsc = %resource, "disabled by tl bitmap");
            reasons.push(format_args!("{resource} - disabled for {}", criteria.title));
            continue;
        }
        if local_dev_bitmap & bit(resource.dev_index) == 0 {
            tracing::trace!(rsc = %resource, "disabled by device bitmap");
            reasons.push(format_args!("{resource} - disabled for {}", criteria.title));
            continue;
        }

        let mut reachable = false;
        for (addr_index, ae) in address_list.iter().enumerate() {
            if addr_index_map & bit(addr_index) == 0 || !worker.is_reachable(rsc_index, ae) {
                continue;
            }
            reachable = true;

            let score = (criteria.calc_score)(&worker.config, &resource.md, &resource.iface, &ae.iface);
            debug_assert!(score >= 0.0);
            let priority = u16::from(resource.iface.priority) + u16::from(ae.iface.priority);

            tracing::trace!(
                rsc = %resource,
                addr_index,
                title = %criteria.title,
                score,
                priority,
                "candidate"
            );

            let better = match &best {
                None => true,
                Some(b) => match score_cmp(score, b.score) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Equal => priority > best_priority,
                    std::cmp::Ordering::Less => false,
                },
            };
            if better {
                best = Some(SelectInfo {
                    rsc_index,
                    addr_index,
                    score,
                });
                best_priority = priority;
            }
        }

        if !reachable {
            reasons.push(format_args!("{resource} - unreachable"));
        }
    }

    match best {
        Some(info) => {
            tracing::trace!(
                rsc = %worker.resource(info.rsc_index),
                addr_index = info.addr_index,
                title = %criteria.title,
                score = info.score,
                "selected"
            );
            Ok(info)
        }
        None => fail(criteria, reasons, show_error),
    }
}

fn fail(criteria: &Criteria, reasons: ReasonBuf, show_error: bool) -> Result<SelectInfo> {
    let reason = reasons.finish();
    if show_error {
        tracing::warn!(title = %criteria.title, %reason, "no transport to peer");
    }
    Err(WeaveError::unreachable(criteria.title.clone(), reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_buf_joins_with_separator() {
        let mut buf = ReasonBuf::new();
        buf.push(format_args!("rc/mlx5_0 - no pending"));
        buf.push(format_args!("tcp/eth0 - unreachable"));
        assert_eq!(
            buf.finish(),
            "rc/mlx5_0 - no pending, tcp/eth0 - unreachable"
        );
    }

    #[test]
    fn test_reason_buf_empty() {
        assert_eq!(ReasonBuf::new().finish(), "");
    }

    #[test]
    fn test_reason_buf_bounded() {
        let mut buf = ReasonBuf::new();
        for i in 0..100 {
            buf.push(format_args!("resource-{i} - no put short"));
        }
        assert!(buf.finish().len() <= ReasonBuf::CAP);
    }
}
