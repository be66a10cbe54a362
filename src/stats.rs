//! Processing statistics.
//!
//! Counts what the clustering worker did during a session and persists the
//! totals so the CLI can report them across runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for the current session.
#[derive(Debug)]
pub struct ProcessingStats {
    /// Number of primary clustering passes completed
    aggregation_passes: AtomicU64,
    /// Number of timeline passes completed
    timeline_passes: AtomicU64,
    /// Number of passes whose groups did not cover every dimension
    anomalies: AtomicU64,
    /// Number of passes replaced by a single all-dimensions group
    fallbacks: AtomicU64,
    /// Number of requests or results dropped in favour of newer ones
    superseded: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ProcessingStats {
    pub fn new() -> Self {
        Self {
            aggregation_passes: AtomicU64::new(0),
            timeline_passes: AtomicU64::new(0),
            anomalies: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create statistics that continue from, and save back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("Could not load previous processing stats: {e}");
        }

        stats
    }

    /// Record a finished primary pass.
    pub fn record_aggregation(&self, anomaly: bool, fell_back: bool) {
        self.aggregation_passes.fetch_add(1, Ordering::Relaxed);
        if anomaly {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
        }
        if fell_back {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a finished timeline pass.
    pub fn record_timeline(&self) {
        self.timeline_passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a request or result discarded because a newer one exists.
    pub fn record_superseded(&self) {
        self.superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            aggregation_passes: self.aggregation_passes.load(Ordering::Relaxed),
            timeline_passes: self.timeline_passes.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Clustering passes: {}\n\
             - Timeline passes: {}\n\
             - Inconsistent groupings: {}\n\
             - Single-group fallbacks: {}\n\
             - Superseded requests: {}\n\
             - Session duration: {} seconds",
            stats.aggregation_passes,
            stats.timeline_passes,
            stats.anomalies,
            stats.fallbacks,
            stats.superseded,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.snapshot();
            let persisted = PersistedStats {
                aggregation_passes: stats.aggregation_passes,
                timeline_passes: stats.timeline_passes,
                anomalies: stats.anomalies,
                fallbacks: stats.fallbacks,
                superseded: stats.superseded,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.aggregation_passes
                    .store(persisted.aggregation_passes, Ordering::Relaxed);
                self.timeline_passes
                    .store(persisted.timeline_passes, Ordering::Relaxed);
                self.anomalies.store(persisted.anomalies, Ordering::Relaxed);
                self.fallbacks.store(persisted.fallbacks, Ordering::Relaxed);
                self.superseded.store(persisted.superseded, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub aggregation_passes: u64,
    pub timeline_passes: u64,
    pub anomalies: u64,
    pub fallbacks: u64,
    pub superseded: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    aggregation_passes: u64,
    timeline_passes: u64,
    anomalies: u64,
    fallbacks: u64,
    superseded: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared statistics.
pub type SharedProcessingStats = Arc<ProcessingStats>;

pub fn create_shared_stats() -> SharedProcessingStats {
    Arc::new(ProcessingStats::new())
}

pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedProcessingStats {
    Arc::new(ProcessingStats::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = ProcessingStats::new();
        stats.record_aggregation(false, false);
        stats.record_aggregation(true, true);
        stats.record_aggregation(true, false);
        stats.record_timeline();
        stats.record_superseded();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.aggregation_passes, 3);
        assert_eq!(snapshot.anomalies, 2);
        assert_eq!(snapshot.fallbacks, 1);
        assert_eq!(snapshot.timeline_passes, 1);
        assert_eq!(snapshot.superseded, 1);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("stream-clusters-stats-{}", uuid::Uuid::new_v4()))
            .join("stats.json");

        let stats = ProcessingStats::with_persistence(path.clone());
        stats.record_aggregation(true, false);
        stats.record_timeline();
        stats.save().unwrap();

        let restored = ProcessingStats::with_persistence(path.clone());
        let snapshot = restored.snapshot();
        assert_eq!(snapshot.aggregation_passes, 1);
        assert_eq!(snapshot.anomalies, 1);
        assert_eq!(snapshot.timeline_passes, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_summary_format() {
        let summary = ProcessingStats::new().summary();
        assert!(summary.contains("Clustering passes"));
        assert!(summary.contains("Superseded requests"));
    }
}
