//! Bounded log of past group assignments, most recent first.

use crate::core::types::{Assignment, AssignmentSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Most-recent-first history of assignment snapshots.
///
/// Identical consecutive assignments are all recorded; repetition is what
/// lets highlight opacity decay over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentHistory {
    /// Maximum number of retained entries
    bound: usize,
    entries: VecDeque<AssignmentSnapshot>,
}

impl AssignmentHistory {
    /// History retaining `min(depth, bound)` entries.
    pub fn new(depth: usize, bound: usize) -> Self {
        let bound = depth.min(bound);
        Self {
            bound,
            entries: VecDeque::with_capacity(bound),
        }
    }

    /// Record the assignment of a pass whose newest row has `timestamp`.
    pub fn record(&mut self, timestamp: i64, assignment: Assignment) {
        self.entries.push_front(AssignmentSnapshot {
            timestamp,
            assignment,
        });
        self.entries.truncate(self.bound);
    }

    /// Change the retention bound, evicting the oldest entries if needed.
    pub fn set_bound(&mut self, depth: usize, bound: usize) {
        self.bound = depth.min(bound);
        self.entries.truncate(self.bound);
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Entries, most recent first.
    pub fn entries(&self) -> impl Iterator<Item = &AssignmentSnapshot> {
        self.entries.iter()
    }

    /// The most recent entry.
    pub fn latest(&self) -> Option<&AssignmentSnapshot> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
