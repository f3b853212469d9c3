//! Stage 1: structural filter on page counts.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::types::CandidatePair;
use crate::index::DocumentRef;

/// A document with its page count. `0` means unknown.
pub type PagedDocument = (Arc<DocumentRef>, u32);

/// Keeps every (left, right) pair whose page counts differ by at most `tolerance`.
///
/// Documents with an unknown page count never pair. Output is left-major, then in
/// `right` order, exactly as a nested loop over both inputs would produce it.
#[instrument(skip_all, fields(left = left.len(), right = right.len(), tolerance))]
pub fn structural_filter(
    left: &[PagedDocument],
    right: &[PagedDocument],
    tolerance: u32,
) -> Vec<CandidatePair> {
    let mut buckets: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (i, (_, pages)) in right.iter().enumerate() {
        if *pages > 0 {
            buckets.entry(*pages).or_default().push(i);
        }
    }

    let mut out = Vec::new();
    let mut matched: Vec<usize> = Vec::new();

    for (doc, pages) in left {
        if *pages == 0 {
            debug!(
                reference_id = %doc.reference_id,
                "Skipping document with unknown page count"
            );
            continue;
        }

        let lo = pages.saturating_sub(tolerance).max(1);
        let hi = pages.saturating_add(tolerance);

        matched.clear();
        for indices in buckets.range(lo..=hi).map(|(_, v)| v) {
            matched.extend_from_slice(indices);
        }
        matched.sort_unstable();

        for &j in &matched {
            let (other, other_pages) = &right[j];
            out.push(CandidatePair::new(
                Arc::clone(doc),
                Arc::clone(other),
                pages.abs_diff(*other_pages),
            ));
        }
    }

    info!(candidates = out.len(), "Stage 1 complete");
    out
}
