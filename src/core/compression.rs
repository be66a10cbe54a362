//! Suppression of globally boring timestamps.
//!
//! Every group keeps the same row count and the same timestamp at each index
//! after compression, so renderers can align groups side by side.

use crate::core::types::Group;

/// Replaces boring rows with gaps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataCompressor {
    /// Collapse a run of boring rows into one gap instead of one gap per row
    save_screen_space: bool,
}

impl DataCompressor {
    pub fn new(save_screen_space: bool) -> Self {
        Self { save_screen_space }
    }

    /// Compress `groups` given the sorted list of globally boring timestamps.
    ///
    /// The first boring row of a run is emitted with every group dimension set
    /// to `None`. Later rows of the run are emitted the same way, or dropped
    /// entirely when screen space is saved. Non-boring rows pass unchanged.
    pub fn compress(&self, groups: &[Group], boring: &[i64]) -> Vec<Group> {
        let Some(reference) = groups.first() else {
            return Vec::new();
        };
        if boring.is_empty() {
            return groups.to_vec();
        }

        let mut compressed: Vec<Group> = groups
            .iter()
            .map(|g| Group {
                dimensions: g.dimensions.clone(),
                rows: Vec::with_capacity(g.rows.len()),
            })
            .collect();

        let mut previous_was_boring = false;
        for (index, timestamp) in reference.rows.iter().map(|r| r.timestamp).enumerate() {
            let is_boring = boring.binary_search(&timestamp).is_ok();

            if !is_boring {
                for (source, target) in groups.iter().zip(compressed.iter_mut()) {
                    if let Some(row) = source.rows.get(index) {
                        target.rows.push(row.clone());
                    }
                }
                previous_was_boring = false;
                continue;
            }

            if previous_was_boring && self.save_screen_space {
                continue;
            }

            for (source, target) in groups.iter().zip(compressed.iter_mut()) {
                if let Some(row) = source.rows.get(index) {
                    target.rows.push(row.blanked(&source.dimensions));
                }
            }
            previous_was_boring = true;
        }

        tracing::debug!(
            boring = boring.len(),
            rows_before = reference.rows.len(),
            rows_after = compressed[0].rows.len(),
            "Compressed boring regions"
        );

        compressed
    }
}
