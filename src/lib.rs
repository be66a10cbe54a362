//! Stream Clusters - grouping, compression and change tracking for
//! multivariate time series.
//!
//! Given a buffer of timestamped rows (one value per named dimension), the
//! library groups dimensions that behave alike, suppresses stretches where
//! every group is flat, and tracks how group membership moves between passes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Stream Clusters                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐                │
//! │  │   Source   │──▶│ RowBuffer  │──▶│  Worker    │ (own thread)   │
//! │  │ (gen/json) │   │  (window)  │   │ aggregate  │                │
//! │  └────────────┘   └────────────┘   │ timeline   │                │
//! │                                    └─────┬──────┘                │
//! │                                          ▼                       │
//! │  ┌────────────┐                   ┌────────────┐                 │
//! │  │ Processing │◀──────────────────│  Session   │──▶ highlights   │
//! │  │   Stats    │                   │ (history)  │                 │
//! │  └────────────┘                   └────────────┘                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use stream_clusters::config::{GroupingStrategy, Settings};
//! use stream_clusters::core::ClusterSession;
//! use stream_clusters::source::{GeneratorConfig, RowGenerator};
//!
//! let mut generator = RowGenerator::new(GeneratorConfig::default());
//! let rows = generator.take_rows(100);
//! let dimensions = generator.dimensions().to_vec();
//!
//! let mut session = ClusterSession::new(Settings::new(GroupingStrategy::Count(3)), 20);
//! let update = session.process(&rows, &dimensions);
//! println!("{} groups", update.view.groups.len());
//! ```

pub mod config;
pub mod core;
pub mod source;
pub mod stats;
pub mod worker;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, GroupingStrategy, RawSettings, Settings};
pub use core::{
    aggregate, cluster_over_time, AggregatedView, Assignment, ClusterSession, ClusterView, Group,
    HighlightInfo, Row, RowBuffer, SessionUpdate,
};
pub use source::{Dataset, DatasetError, GeneratorMode, RowGenerator};
pub use stats::{ProcessingStats, SharedProcessingStats, StatsSnapshot};
pub use worker::{ClusteringWorker, Job, JobKind, JobOutcome, WorkerError, WorkerResponse};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
