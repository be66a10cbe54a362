//! Highlighting of recently reassigned dimensions.
//!
//! A dimension is compared with its own group in each inspected history
//! entry. The more entries disagree with the current group, the stronger the
//! highlight. Dimensions that never disagree are left out; consumers apply
//! their own low baseline opacity to them.

use crate::core::history::AssignmentHistory;
use crate::core::types::{Assignment, Group, HighlightInfo};

/// Compute highlight information for every reassigned dimension.
///
/// Only the first `depth` history entries are inspected. `history` is expected
/// to hold earlier passes only, not the one that produced `current`.
pub fn estimate_highlights(
    current: &Assignment,
    history: &AssignmentHistory,
    depth: usize,
) -> Vec<HighlightInfo> {
    let inspected = history.len().min(depth);
    if inspected == 0 {
        return Vec::new();
    }

    current
        .iter()
        .filter_map(|(dimension, group)| {
            let mut different = 0usize;
            let mut last_different_group = None;
            let mut seen_difference = false;

            for snapshot in history.entries().take(inspected) {
                let past = snapshot.assignment.group_of(dimension);
                if past != Some(group) {
                    different += 1;
                    if !seen_difference {
                        seen_difference = true;
                        last_different_group = past;
                    }
                }
            }

            (different > 0).then(|| HighlightInfo {
                dimension: dimension.to_string(),
                opacity: different as f64 / inspected as f64,
                last_different_group,
            })
        })
        .collect()
}

/// Arrange highlight entries per group, following each group's dimension order.
pub fn highlights_by_group(groups: &[Group], highlights: &[HighlightInfo]) -> Vec<Vec<HighlightInfo>> {
    groups
        .iter()
        .map(|group| {
            group
                .dimensions
                .iter()
                .filter_map(|d| highlights.iter().find(|h| &h.dimension == d).cloned())
                .collect()
        })
        .collect()
}
