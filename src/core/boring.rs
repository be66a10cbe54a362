//! Detection of visually insignificant ("boring") regions.
//!
//! A timestamp is boring for a group when every dimension of the group is
//! flat around it: the relative range `(max - min) / mean` of a small local
//! window stays below `mean_range`. Only timestamps boring for *every* group
//! may be suppressed, so a flat group never hides another group's signal.

use crate::config::CompressionConfig;
use crate::core::types::Group;
use statrs::statistics::Statistics;
use std::collections::BTreeSet;

/// Relative range of a set of values.
///
/// Returns `None` when the test cannot be made: no values, or a zero or
/// non-finite mean. Callers treat `None` as "not flat".
pub fn relative_range(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = Statistics::mean(values);
    if mean == 0.0 || !mean.is_finite() {
        return None;
    }
    let range = Statistics::max(values) - Statistics::min(values);
    // Negative means would make every range look small.
    Some(range / mean.abs())
}

/// Finds boring timestamps within one group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoringRegionDetector {
    mean_range: f64,
    tick_range: usize,
}

impl BoringRegionDetector {
    pub fn new(mean_range: f64, tick_range: usize) -> Self {
        Self {
            mean_range,
            tick_range,
        }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(config.mean_range, config.tick_range)
    }

    /// Rows looked at before the inspected index.
    pub fn ticks_before(&self) -> usize {
        self.tick_range.saturating_sub(1) / 2
    }

    /// Rows looked at from the inspected index onwards.
    pub fn ticks_after(&self) -> usize {
        self.tick_range - self.ticks_before()
    }

    /// Boring timestamps of a group, in row order.
    ///
    /// Only interior indices are classified: the first `ticks_before` and the
    /// last `ticks_after` rows never are. A missing value anywhere in the local
    /// window makes the index not boring.
    pub fn detect(&self, group: &Group) -> Vec<i64> {
        let rows = &group.rows;
        let before = self.ticks_before();
        let after = self.ticks_after();
        let end = rows.len().saturating_sub(after);
        if before >= end {
            return Vec::new();
        }

        let columns: Vec<Vec<Option<f64>>> = group
            .dimensions
            .iter()
            .map(|d| rows.iter().map(|row| row.value(d)).collect())
            .collect();

        let mut local = Vec::with_capacity(self.tick_range);
        (before..end)
            .filter(|&index| {
                columns.iter().all(|column| {
                    local.clear();
                    for value in &column[index - before..index + after] {
                        match value {
                            Some(v) => local.push(*v),
                            None => return false,
                        }
                    }
                    relative_range(&local).is_some_and(|r| r < self.mean_range)
                })
            })
            .map(|index| rows[index].timestamp)
            .collect()
    }
}

/// Timestamps present in every list, sorted ascending.
///
/// No lists at all means no common timestamps.
pub fn common_boring_timestamps(per_group: &[Vec<i64>]) -> Vec<i64> {
    let Some((first, rest)) = per_group.split_first() else {
        return Vec::new();
    };

    let mut common: BTreeSet<i64> = first.iter().copied().collect();
    for timestamps in rest {
        let other: BTreeSet<i64> = timestamps.iter().copied().collect();
        common.retain(|t| other.contains(t));
        if common.is_empty() {
            break;
        }
    }
    common.into_iter().collect()
}
