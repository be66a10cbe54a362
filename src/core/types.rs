//! Data types shared by the clustering engine.
//!
//! Rows are read-only inputs produced by an external data source. Everything
//! else here is derived by a clustering pass and can be serialized for
//! consumers such as renderers or legend components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One multivariate sample: a timestamp plus a value per dimension.
///
/// A value of `None` marks a point that was suppressed by compression (or was
/// absent in the source). The key is kept so every row of a group has the
/// same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Timestamp in milliseconds, non-decreasing within a buffer
    pub timestamp: i64,
    /// Values keyed by dimension name
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl Row {
    /// Create a row with no dimension values.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp,
            values: BTreeMap::new(),
        }
    }

    /// Build a row from `(dimension, value)` pairs.
    pub fn from_values<I, S>(timestamp: i64, values: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            timestamp,
            values: values
                .into_iter()
                .map(|(dimension, value)| (dimension.into(), Some(value)))
                .collect(),
        }
    }

    /// Get the value of a dimension, if present and not suppressed.
    pub fn value(&self, dimension: &str) -> Option<f64> {
        self.values.get(dimension).copied().flatten()
    }

    /// Set (or insert) the value of a dimension.
    pub fn set(&mut self, dimension: impl Into<String>, value: Option<f64>) {
        self.values.insert(dimension.into(), value);
    }

    /// Restrict this row to the given dimensions, keeping the timestamp.
    ///
    /// Dimensions the row does not carry are skipped rather than invented.
    pub fn project(&self, dimensions: &[String]) -> Row {
        let values = dimensions
            .iter()
            .filter_map(|d| self.values.get(d).map(|v| (d.clone(), *v)))
            .collect();
        Row {
            timestamp: self.timestamp,
            values,
        }
    }

    /// Copy of this row with every listed dimension set to `None`.
    pub fn blanked(&self, dimensions: &[String]) -> Row {
        let mut row = self.clone();
        for dimension in dimensions {
            row.values.insert(dimension.clone(), None);
        }
        row
    }

    /// Names of the dimensions carried by this row.
    pub fn dimension_names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// A set of dimensions displayed together, with its projected rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Dimensions owned by this group, in discovery order
    pub dimensions: Vec<String>,
    /// Rows restricted to `dimensions`
    pub rows: Vec<Row>,
}

impl Group {
    /// Build a group by projecting every window row onto `dimensions`.
    pub fn from_window(window: &[Row], dimensions: Vec<String>) -> Self {
        let rows = window.iter().map(|row| row.project(&dimensions)).collect();
        Self { dimensions, rows }
    }

    /// Whether the group owns the given dimension.
    pub fn contains(&self, dimension: &str) -> bool {
        self.dimensions.iter().any(|d| d == dimension)
    }

    /// Timestamps of the group's rows, in order.
    pub fn timestamps(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }
}

/// Current mapping of dimension to group index.
///
/// Entries follow the order of the input dimension list. Serialized as a list
/// of `[dimension, group]` pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignment {
    entries: Vec<(String, usize)>,
}

impl Assignment {
    /// Derive the assignment of `dimensions` from a list of groups.
    ///
    /// Dimensions found in no group are left out.
    pub fn from_groups(groups: &[Group], dimensions: &[String]) -> Self {
        let entries = dimensions
            .iter()
            .filter_map(|dimension| {
                groups
                    .iter()
                    .position(|g| g.contains(dimension))
                    .map(|index| (dimension.clone(), index))
            })
            .collect();
        Self { entries }
    }

    /// Group index of a dimension.
    pub fn group_of(&self, dimension: &str) -> Option<usize> {
        self.entries
            .iter()
            .find(|(d, _)| d == dimension)
            .map(|(_, g)| *g)
    }

    /// Iterate over `(dimension, group)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(d, g)| (d.as_str(), *g))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, usize)> for Assignment {
    fn from_iter<T: IntoIterator<Item = (String, usize)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An assignment recorded at the timestamp of the newest analysed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentSnapshot {
    pub timestamp: i64,
    pub assignment: Assignment,
}

/// Group assignment for one position of the sliding timeline window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    /// Timestamp of the row directly after the analysed window
    pub timestamp: i64,
    pub assignment: Assignment,
}

/// How strongly a dimension should be highlighted as recently reassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightInfo {
    pub dimension: String,
    /// Share of inspected history entries that disagree, in `(0, 1]`
    pub opacity: f64,
    /// Group index of the most recent disagreeing entry; `None` when the
    /// dimension was unassigned there
    pub last_different_group: Option<usize>,
}

/// Shared vertical range across every dimension of the analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YDomain {
    pub min: f64,
    pub max: f64,
}

impl YDomain {
    /// Min/max over every non-null dimension value of the rows.
    pub fn from_rows(rows: &[Row]) -> Option<Self> {
        rows.iter()
            .flat_map(|row| row.values.values().filter_map(|v| *v))
            .filter(|v| v.is_finite())
            .fold(None, |domain, v| match domain {
                None => Some(YDomain { min: v, max: v }),
                Some(d) => Some(YDomain {
                    min: d.min.min(v),
                    max: d.max.max(v),
                }),
            })
    }
}
