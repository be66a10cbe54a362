//! Timeline of group assignments over a sliding window.
//!
//! For every row index `i >= w`, the rows `[i - w, i)` are clustered and the
//! resulting assignment is labelled with the timestamp of row `i`. Cost grows
//! with buffer length times the per-window clustering cost, so callers should
//! run this far less often than the primary pass.

use crate::config::Settings;
use crate::core::clustering::ClusterAssigner;
use crate::core::types::{ClusterView, Row};

/// Window length used when neither an explicit size nor `data_ticks` is set.
pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

/// Replays cluster assignment over a sliding window.
#[derive(Debug, Clone, Copy)]
pub struct TemporalClusterer {
    assigner: ClusterAssigner,
    context_window: usize,
}

impl TemporalClusterer {
    /// Use `context_window` rows per position, falling back to the settings'
    /// `data_ticks` and then to [`DEFAULT_CONTEXT_WINDOW`].
    pub fn new(settings: &Settings, context_window: Option<usize>) -> Self {
        let context_window = context_window
            .filter(|&w| w > 0)
            .or(settings.data_ticks.filter(|&t| t > 0))
            .unwrap_or(DEFAULT_CONTEXT_WINDOW);
        Self {
            assigner: ClusterAssigner::new(settings.grouping),
            context_window,
        }
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// One view per eligible row index, in buffer order.
    pub fn run(&self, rows: &[Row], dimensions: &[String]) -> Vec<ClusterView> {
        let w = self.context_window;
        let views: Vec<ClusterView> = (w..rows.len())
            .map(|index| {
                let clustering = self.assigner.assign(&rows[index - w..index], dimensions);
                ClusterView {
                    timestamp: rows[index].timestamp,
                    assignment: clustering.assignment(dimensions),
                }
            })
            .collect();

        tracing::debug!(
            rows = rows.len(),
            context_window = w,
            views = views.len(),
            "Temporal clustering finished"
        );
        views
    }
}

/// Convenience wrapper around [`TemporalClusterer`].
pub fn cluster_over_time(
    rows: &[Row],
    dimensions: &[String],
    settings: &Settings,
    context_window: Option<usize>,
) -> Vec<ClusterView> {
    TemporalClusterer::new(settings, context_window).run(rows, dimensions)
}
