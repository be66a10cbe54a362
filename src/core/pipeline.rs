//! A full clustering pass and the caller-side session around it.
//!
//! ```text
//! rows ─▶ select_window ─▶ ClusterAssigner ─▶ BoringRegionDetector (per group)
//!                               │                      │
//!                               │              common_boring_timestamps
//!                               │                      │
//!                               ▼                      ▼
//!                          Assignment            DataCompressor ─▶ groups
//!                               │
//!                               ▼
//!          AssignmentHistory ─▶ estimate_highlights   (ClusterSession)
//! ```

use crate::config::Settings;
use crate::core::boring::{common_boring_timestamps, BoringRegionDetector};
use crate::core::clustering::{ClusterAssigner, Clustering, ConsistencyAnomaly};
use crate::core::compression::DataCompressor;
use crate::core::highlighting::estimate_highlights;
use crate::core::history::AssignmentHistory;
use crate::core::types::{Assignment, Group, HighlightInfo, Row, YDomain};
use crate::core::windowing::select_window;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Output of one clustering pass, ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedView {
    /// Grouped (and possibly compressed) rows
    pub groups: Vec<Group>,
    /// Shared vertical range of the analysis window
    pub y_domain: Option<YDomain>,
    /// Group index of every assigned dimension
    pub assignment: Assignment,
    /// Timestamps suppressed because every group was flat there
    pub boring_timestamps: Vec<i64>,
    /// Set when the groups did not cover every dimension
    pub anomaly: Option<ConsistencyAnomaly>,
    /// Whether the groups were replaced by a single all-dimensions group
    pub fell_back: bool,
    /// Timestamp of the newest row in the analysis window
    pub last_timestamp: Option<i64>,
}

/// Run one pass: window selection, grouping and compression.
///
/// A consistency anomaly is reported on the view; the groups are left as the
/// assigner produced them.
pub fn aggregate(rows: &[Row], dimensions: &[String], settings: &Settings) -> AggregatedView {
    run_pass(rows, dimensions, settings, false)
}

/// Like [`aggregate`], but an inconsistent grouping is replaced by one group
/// holding every dimension.
pub fn aggregate_with_fallback(
    rows: &[Row],
    dimensions: &[String],
    settings: &Settings,
) -> AggregatedView {
    run_pass(rows, dimensions, settings, true)
}

fn run_pass(rows: &[Row], dimensions: &[String], settings: &Settings, fallback: bool) -> AggregatedView {
    let started = Instant::now();
    let window = select_window(rows, settings.data_ticks);

    let clustering = ClusterAssigner::new(settings.grouping).assign(window, dimensions);
    let (clustering, anomaly, fell_back) = settle(clustering, window, dimensions, fallback);

    let assignment = clustering.assignment(dimensions);

    let (groups, boring_timestamps) = match settings.active_compression() {
        Some(config) if !window.is_empty() => {
            let detector = BoringRegionDetector::from_config(config);
            let per_group: Vec<Vec<i64>> = clustering
                .groups
                .iter()
                .map(|group| detector.detect(group))
                .collect();
            let boring = common_boring_timestamps(&per_group);
            let groups = DataCompressor::new(config.save_screen_space)
                .compress(&clustering.groups, &boring);
            (groups, boring)
        }
        _ => (clustering.groups, Vec::new()),
    };

    let view = AggregatedView {
        groups,
        y_domain: YDomain::from_rows(window),
        assignment,
        boring_timestamps,
        anomaly,
        fell_back,
        last_timestamp: window.last().map(|r| r.timestamp),
    };

    tracing::debug!(
        window = window.len(),
        groups = view.groups.len(),
        boring = view.boring_timestamps.len(),
        fell_back,
        elapsed_us = started.elapsed().as_micros() as u64,
        "Clustering pass finished"
    );

    view
}

/// Split off the anomaly and, when `fallback` is set and there is one,
/// replace the groups with a single group of every dimension.
fn settle(
    mut clustering: Clustering,
    window: &[Row],
    dimensions: &[String],
    fallback: bool,
) -> (Clustering, Option<ConsistencyAnomaly>, bool) {
    let anomaly = clustering.anomaly.take();
    if fallback && anomaly.is_some() {
        return (Clustering::single_group(window, dimensions), anomaly, true);
    }
    (clustering, anomaly, false)
}

/// Result handed to consumers after a pass was applied to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub view: AggregatedView,
    pub highlights: Vec<HighlightInfo>,
}

/// Caller-side owner of the assignment history for one logical view.
///
/// Passes may be computed elsewhere (see [`crate::worker`]); applying their
/// results happens here, one at a time, so history has a single writer.
#[derive(Debug, Clone)]
pub struct ClusterSession {
    settings: Settings,
    history: AssignmentHistory,
    history_bound: usize,
    fallback_to_single_group: bool,
}

impl ClusterSession {
    /// Create a session; history keeps `min(depth, history_bound)` entries.
    pub fn new(settings: Settings, history_bound: usize) -> Self {
        let history =
            AssignmentHistory::new(settings.cluster_assignment_history_depth, history_bound);
        Self {
            settings,
            history,
            history_bound,
            fallback_to_single_group: true,
        }
    }

    /// Choose whether inconsistent groupings fall back to a single group.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_single_group = enabled;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn history(&self) -> &AssignmentHistory {
        &self.history
    }

    pub fn fallback_enabled(&self) -> bool {
        self.fallback_to_single_group
    }

    /// Swap settings for future passes. History is kept, trimmed to the new depth.
    pub fn update_settings(&mut self, settings: Settings) {
        self.history
            .set_bound(settings.cluster_assignment_history_depth, self.history_bound);
        self.settings = settings;
    }

    /// Run a pass synchronously and apply it.
    pub fn process(&mut self, rows: &[Row], dimensions: &[String]) -> SessionUpdate {
        let view = if self.fallback_to_single_group {
            aggregate_with_fallback(rows, dimensions, &self.settings)
        } else {
            aggregate(rows, dimensions, &self.settings)
        };
        self.apply(view)
    }

    /// Apply a finished pass: highlight against earlier passes, then record it.
    ///
    /// Passes over an empty window carry no timestamp and are not recorded.
    pub fn apply(&mut self, view: AggregatedView) -> SessionUpdate {
        let highlights = estimate_highlights(
            &view.assignment,
            &self.history,
            self.settings.cluster_assignment_history_depth,
        );

        if let Some(timestamp) = view.last_timestamp {
            self.history.record(timestamp, view.assignment.clone());
        }

        SessionUpdate { view, highlights }
    }

    /// Forget all recorded assignments.
    pub fn reset_history(&mut self) {
        self.history.clear();
    }
}
