//! Contact matching.
//!
//! A remote record with a UID matches only by exact UID equality. Without
//! a UID, a probabilistic fallback scores every unclaimed local candidate
//! by the share of equal base properties and accepts the best score only
//! above a fixed threshold.

use std::collections::BTreeSet;

use cardsync_core::{ContactRecord, Property};

/// Minimum match probability, deliberately a hair above two thirds so a
/// 2-of-3 candidate passes without floating-point tie ambiguity at exactly
/// 2/3.
pub const MATCH_THRESHOLD: f64 = 0.665;

/// Pairs a remote record against the local candidates.
///
/// `claimed` holds UIDs of locals already paired in this session; they are
/// not considered again. Returns `None` when nothing matches, which the
/// session treats as "new contact", never as an error.
#[must_use]
pub fn match_contact<'a>(
    remote: &ContactRecord,
    candidates: &'a [ContactRecord],
    claimed: &BTreeSet<String>,
) -> Option<&'a ContactRecord> {
    let uid = remote.uid();
    if !uid.is_empty() {
        return candidates
            .iter()
            .find(|local| local.uid() == uid && !claimed.contains(local.uid()));
    }

    let mut best: Option<(&ContactRecord, f64)> = None;
    for local in candidates {
        if claimed.contains(local.uid()) {
            continue;
        }
        let Some(probability) = similarity(local, remote) else {
            continue;
        };
        if best.is_none_or(|(_, p)| probability > p) {
            best = Some((local, probability));
        }
    }
    best.and_then(|(local, p)| (p > MATCH_THRESHOLD).then_some(local))
}

/// Share of base properties with equal values, counted over the properties
/// the remote record actually carries. `None` when the remote record
/// carries none of them.
fn similarity(local: &ContactRecord, remote: &ContactRecord) -> Option<f64> {
    let mut total = 0_u32;
    let mut matches = 0_u32;
    for &property in Property::BASE {
        let remote_value = remote.get(property);
        if remote_value.is_empty() {
            continue;
        }
        total += 1;
        if local.get(property) == remote_value {
            matches += 1;
        }
    }
    (total > 0).then(|| f64::from(matches) / f64::from(total))
}
