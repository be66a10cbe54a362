//! Core clustering engine.
//!
//! This module contains:
//! - Window selection over the raw row buffer
//! - Dimension grouping by count or by density
//! - Boring-region detection and compression
//! - Assignment history, highlighting and the temporal timeline

pub mod boring;
pub mod clustering;
pub mod compression;
pub mod highlighting;
pub mod history;
pub mod pipeline;
pub mod temporal;
pub mod types;
pub mod windowing;

// Re-export commonly used types
pub use boring::{common_boring_timestamps, relative_range, BoringRegionDetector};
pub use clustering::{ClusterAssigner, Clustering, ConsistencyAnomaly};
pub use compression::DataCompressor;
pub use highlighting::{estimate_highlights, highlights_by_group};
pub use history::AssignmentHistory;
pub use pipeline::{aggregate, aggregate_with_fallback, AggregatedView, ClusterSession, SessionUpdate};
pub use temporal::{cluster_over_time, TemporalClusterer};
pub use types::{Assignment, AssignmentSnapshot, ClusterView, Group, HighlightInfo, Row, YDomain};
pub use windowing::{select_window, BufferError, RowBuffer};
