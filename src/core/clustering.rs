//! Partitioning of dimensions into groups.
//!
//! Two strategies are available:
//! - **Count**: rank dimensions by their newest value and cut the ranking into
//!   `k` contiguous slices.
//! - **Density**: treat every dimension as one point (its time series) and run
//!   a DBSCAN-style expansion with Euclidean distance between series.
//!
//! The density expansion uses the radius `eps` as its neighbour-count
//! threshold as well. Saved `eps` values depend on this, so it is kept.

use crate::config::GroupingStrategy;
use crate::core::types::{Assignment, Group, Row};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Density result whose groups do not cover every input dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyAnomaly {
    /// Number of input dimensions
    pub expected: usize,
    /// Number of dimensions placed in a group
    pub assigned: usize,
    /// Input dimensions found in no group
    pub missing: Vec<String>,
}

/// Result of one assignment pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub groups: Vec<Group>,
    /// Set when the groups do not partition the input dimensions
    pub anomaly: Option<ConsistencyAnomaly>,
}

impl Clustering {
    /// Dimension-to-group mapping for the given dimension order.
    pub fn assignment(&self, dimensions: &[String]) -> Assignment {
        Assignment::from_groups(&self.groups, dimensions)
    }

    /// One group holding every dimension, for callers falling back after an anomaly.
    pub fn single_group(window: &[Row], dimensions: &[String]) -> Self {
        Self {
            groups: vec![Group::from_window(window, dimensions.to_vec())],
            anomaly: None,
        }
    }
}

/// Assigns dimensions to groups with a fixed strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterAssigner {
    strategy: GroupingStrategy,
}

impl ClusterAssigner {
    pub fn new(strategy: GroupingStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    /// Partition `dimensions` over the rows of `window`.
    pub fn assign(&self, window: &[Row], dimensions: &[String]) -> Clustering {
        let groups = match self.strategy {
            GroupingStrategy::Count(count) => cluster_by_count(window, dimensions, count),
            GroupingStrategy::Density(eps) => cluster_by_density(window, dimensions, eps),
        };
        let anomaly = check_partition(&groups, dimensions);
        if let Some(ref anomaly) = anomaly {
            tracing::warn!(
                expected = anomaly.expected,
                assigned = anomaly.assigned,
                missing = ?anomaly.missing,
                "Groups do not cover every dimension"
            );
        }
        Clustering { groups, anomaly }
    }
}

/// Split dimensions into `count` slices ranked by their value in the newest row.
///
/// Ties keep the input order. An empty window yields `count` empty groups.
pub fn cluster_by_count(window: &[Row], dimensions: &[String], count: u32) -> Vec<Group> {
    let count = count.max(1) as usize;

    let Some(reference) = window.last() else {
        return vec![Group::default(); count];
    };

    // Missing values rank last.
    let rank = |d: &String| reference.value(d).unwrap_or(f64::NEG_INFINITY);
    let mut sorted: Vec<String> = dimensions.to_vec();
    sorted.sort_by(|a, b| rank(b).partial_cmp(&rank(a)).unwrap_or(Ordering::Equal));

    let per_group = sorted.len().div_ceil(count);

    (0..count)
        .map(|index| {
            let start = (index * per_group).min(sorted.len());
            let end = ((index + 1) * per_group).min(sorted.len());
            Group::from_window(window, sorted[start..end].to_vec())
        })
        .collect()
}

/// One dimension's values, aligned with the window's rows.
struct Series<'a> {
    dimension: &'a String,
    values: Vec<Option<f64>>,
}

/// Euclidean distance over the timestamps where both series have a value.
fn series_distance(a: &Series<'_>, b: &Series<'_>) -> f64 {
    a.values
        .iter()
        .zip(&b.values)
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) => Some((x - y).powi(2)),
            _ => None,
        })
        .sum::<f64>()
        .sqrt()
}

/// Group dimensions with a DBSCAN-style expansion over their time series.
///
/// Every unvisited dimension seeds a new group and pulls in all neighbours
/// within `eps`. A neighbour's own neighbours join the expansion when there
/// are at least `eps` of them. Groups appear in discovery order.
pub fn cluster_by_density(window: &[Row], dimensions: &[String], eps: f64) -> Vec<Group> {
    let series: Vec<Series<'_>> = dimensions
        .iter()
        .map(|dimension| Series {
            dimension,
            values: window.iter().map(|row| row.value(dimension)).collect(),
        })
        .collect();

    let neighbors = |index: usize| -> Vec<usize> {
        (0..series.len())
            .filter(|&other| {
                other != index && series_distance(&series[index], &series[other]) <= eps
            })
            .collect()
    };

    let mut visited = vec![false; series.len()];
    let mut clustered = vec![false; series.len()];
    let mut groups = Vec::new();

    for seed in 0..series.len() {
        if visited[seed] || clustered[seed] {
            continue;
        }
        visited[seed] = true;

        let mut members = vec![seed];
        clustered[seed] = true;

        let mut queue = neighbors(seed);
        let mut cursor = 0;
        while cursor < queue.len() {
            let candidate = queue[cursor];
            cursor += 1;

            if !visited[candidate] {
                visited[candidate] = true;
                let reachable = neighbors(candidate);
                if reachable.len() as f64 >= eps {
                    queue.extend(reachable);
                }
            }

            if !clustered[candidate] {
                clustered[candidate] = true;
                members.push(candidate);
            }
        }

        let member_dimensions: Vec<String> = members
            .into_iter()
            .map(|i| series[i].dimension.clone())
            .collect();
        groups.push(Group::from_window(window, member_dimensions));
    }

    tracing::debug!(
        dimensions = dimensions.len(),
        groups = groups.len(),
        eps,
        "Density clustering finished"
    );

    groups
}

/// Verify that every input dimension appears in exactly one group.
pub fn check_partition(groups: &[Group], dimensions: &[String]) -> Option<ConsistencyAnomaly> {
    // Empty groups from an empty window carry no dimensions at all.
    if groups.iter().all(|g| g.dimensions.is_empty()) {
        return None;
    }

    let assigned: usize = groups.iter().map(|g| g.dimensions.len()).sum();
    let missing: Vec<String> = dimensions
        .iter()
        .filter(|d| !groups.iter().any(|g| g.contains(d)))
        .cloned()
        .collect();

    if assigned == dimensions.len() && missing.is_empty() {
        None
    } else {
        Some(ConsistencyAnomaly {
            expected: dimensions.len(),
            assigned,
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn group_dims(groups: &[Group]) -> Vec<Vec<&str>> {
        groups
            .iter()
            .map(|g| g.dimensions.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_count_ranks_by_newest_row() {
        let window = vec![
            Row::from_values(1, [("A", 0.0), ("B", 100.0), ("C", 0.0), ("D", 0.0)]),
            Row::from_values(2, [("A", 10.0), ("B", 5.0), ("C", 8.0), ("D", 1.0)]),
        ];
        let groups = cluster_by_count(&window, &dims(&["A", "B", "C", "D"]), 2);

        assert_eq!(group_dims(&groups), vec![vec!["A", "C"], vec!["B", "D"]]);
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[1].rows[0].value("B"), Some(100.0));
        assert!(groups[0].rows[0].value("B").is_none());
    }

    #[test]
    fn test_count_ties_keep_input_order() {
        let window = vec![Row::from_values(
            1,
            [("x", 1.0), ("y", 1.0), ("z", 2.0)],
        )];
        let groups = cluster_by_count(&window, &dims(&["y", "x", "z"]), 3);

        assert_eq!(group_dims(&groups), vec![vec!["z"], vec!["y"], vec!["x"]]);
    }

    #[test]
    fn test_count_uneven_last_slice() {
        let window = vec![Row::from_values(
            1,
            [("a", 5.0), ("b", 4.0), ("c", 3.0), ("d", 2.0), ("e", 1.0)],
        )];
        let groups = cluster_by_count(&window, &dims(&["a", "b", "c", "d", "e"]), 3);

        assert_eq!(
            group_dims(&groups),
            vec![vec!["a", "b"], vec!["c", "d"], vec!["e"]]
        );
    }

    #[test]
    fn test_count_more_groups_than_dimensions() {
        let window = vec![Row::from_values(1, [("a", 1.0), ("b", 2.0)])];
        let groups = cluster_by_count(&window, &dims(&["a", "b"]), 4);

        assert_eq!(groups.len(), 4);
        assert_eq!(group_dims(&groups), vec![vec!["b"], vec!["a"], vec![], vec![]]);
        assert!(check_partition(&groups, &dims(&["a", "b"])).is_none());
    }

    #[test]
    fn test_count_empty_window() {
        let groups = cluster_by_count(&[], &dims(&["a", "b"]), 3);

        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.rows.is_empty() && g.dimensions.is_empty()));
    }

    #[test]
    fn test_density_identical_series_share_group() {
        let window: Vec<Row> = (0..5)
            .map(|i| {
                let v = i as f64;
                Row::from_values(i, [("a", v), ("b", v), ("c", v + 1000.0)])
            })
            .collect();
        let groups = cluster_by_density(&window, &dims(&["a", "b", "c"]), 0.01);

        assert_eq!(group_dims(&groups), vec![vec!["a", "b"], vec!["c"]]);
        assert_eq!(groups[1].rows.len(), 5);
    }

    #[test]
    fn test_density_neighbor_threshold_uses_eps() {
        // a-b and b-c are 1.0 apart, a-c is 2.0 apart.
        let window = vec![Row::from_values(1, [("a", 0.0), ("b", 1.0), ("c", 2.0)])];

        // eps = 1.0: b has two neighbours (>= 1.0), so the expansion reaches c.
        let groups = cluster_by_density(&window, &dims(&["a", "b", "c"]), 1.0);
        assert_eq!(group_dims(&groups), vec![vec!["a", "b", "c"]]);

        // eps = 1.5: b's two neighbours still meet the threshold.
        let groups = cluster_by_density(&window, &dims(&["a", "b", "c"]), 1.5);
        assert_eq!(group_dims(&groups), vec![vec!["a", "b", "c"]]);

        // A longer chain keeps expanding while every link has a neighbour.
        let window = vec![Row::from_values(
            1,
            [("a", 0.0), ("b", 1.0), ("c", 2.0), ("d", 3.0)],
        )];
        let groups = cluster_by_density(&window, &dims(&["a", "b", "c", "d"]), 1.0);
        assert_eq!(group_dims(&groups), vec![vec!["a", "b", "c", "d"]]);
    }

    #[test]
    fn test_density_large_eps_blocks_expansion() {
        // Spacing of 3 with eps = 3: direct neighbours join, but no point has
        // three neighbours so the expansion never propagates.
        let window = vec![Row::from_values(
            1,
            [("a", 0.0), ("b", 3.0), ("c", 6.0), ("d", 9.0)],
        )];
        let groups = cluster_by_density(&window, &dims(&["a", "b", "c", "d"]), 3.0);

        assert_eq!(group_dims(&groups), vec![vec!["a", "b"], vec!["c", "d"]]);
        assert!(check_partition(&groups, &dims(&["a", "b", "c", "d"])).is_none());
    }

    #[test]
    fn test_density_ignores_missing_values() {
        let mut first = Row::from_values(1, [("a", 1.0), ("b", 1.0)]);
        first.set("b", None);
        let window = vec![first, Row::from_values(2, [("a", 2.0), ("b", 2.0)])];

        let groups = cluster_by_density(&window, &dims(&["a", "b"]), 0.5);
        assert_eq!(group_dims(&groups), vec![vec!["a", "b"]]);
    }

    #[test]
    fn test_check_partition_reports_missing() {
        let window = vec![Row::from_values(1, [("a", 1.0), ("b", 2.0), ("c", 3.0)])];
        let groups = vec![Group::from_window(&window, dims(&["a", "c"]))];

        let anomaly = check_partition(&groups, &dims(&["a", "b", "c"])).unwrap();
        assert_eq!(anomaly.expected, 3);
        assert_eq!(anomaly.assigned, 2);
        assert_eq!(anomaly.missing, vec!["b".to_string()]);
    }

    #[test]
    fn test_assigner_dispatch() {
        let window = vec![Row::from_values(1, [("a", 1.0), ("b", 2.0)])];
        let assigner = ClusterAssigner::new(GroupingStrategy::Count(2));
        let clustering = assigner.assign(&window, &dims(&["a", "b"]));

        assert!(clustering.anomaly.is_none());
        let assignment = clustering.assignment(&dims(&["a", "b"]));
        assert_eq!(assignment.group_of("b"), Some(0));
        assert_eq!(assignment.group_of("a"), Some(1));
    }
}
