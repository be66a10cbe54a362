//! Window selection over the raw row buffer.
//!
//! The analysis window is the tail of the buffer. The buffer itself belongs to
//! the ingestion side; [`RowBuffer`] is a small append-only holder for callers
//! that do not bring their own.

use crate::core::types::Row;
use serde::{Deserialize, Serialize};

/// Return the last `data_ticks` rows, or the whole buffer when no limit is set.
///
/// `None` and `Some(0)` both mean "no limit".
pub fn select_window(rows: &[Row], data_ticks: Option<usize>) -> &[Row] {
    match data_ticks {
        Some(ticks) if ticks > 0 && ticks < rows.len() => &rows[rows.len() - ticks..],
        _ => rows,
    }
}

/// Reasons a row can be refused by a [`RowBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum BufferError {
    /// The row's timestamp is older than the newest buffered row
    OutOfOrder { last: i64, received: i64 },
    /// The row does not carry exactly the buffer's dimensions
    DimensionMismatch { expected: usize, received: usize },
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::OutOfOrder { last, received } => {
                write!(f, "Row timestamp {received} is older than {last}")
            }
            BufferError::DimensionMismatch { expected, received } => write!(
                f,
                "Row carries {received} dimensions but the buffer expects {expected}"
            ),
        }
    }
}

impl std::error::Error for BufferError {}

/// Append-only row buffer that keeps the same-dimension-set invariant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowBuffer {
    /// Dimension names, fixed by the first row
    dimensions: Vec<String>,
    /// Buffered rows, oldest first
    rows: Vec<Row>,
    /// Maximum number of rows kept (oldest are dropped)
    capacity: Option<usize>,
}

impl RowBuffer {
    /// Create an empty, unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that keeps at most `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Append a row.
    ///
    /// Unless [`RowBuffer::set_dimensions`] was called, the first row fixes
    /// the dimension set. Every row must carry exactly those keys and must not
    /// go back in time.
    pub fn push(&mut self, row: Row) -> Result<(), BufferError> {
        if let Some(last) = self.rows.last() {
            if row.timestamp < last.timestamp {
                return Err(BufferError::OutOfOrder {
                    last: last.timestamp,
                    received: row.timestamp,
                });
            }
        }

        if self.dimensions.is_empty() && self.rows.is_empty() {
            self.dimensions = row.dimension_names().map(str::to_string).collect();
        } else {
            let same_keys = row.values.len() == self.dimensions.len()
                && self.dimensions.iter().all(|d| row.values.contains_key(d));
            if !same_keys {
                return Err(BufferError::DimensionMismatch {
                    expected: self.dimensions.len(),
                    received: row.values.len(),
                });
            }
        }

        self.rows.push(row);

        if let Some(capacity) = self.capacity {
            if self.rows.len() > capacity {
                let excess = self.rows.len() - capacity;
                self.rows.drain(..excess);
            }
        }
        Ok(())
    }

    /// Append several rows, stopping at the first refused one.
    pub fn extend(&mut self, rows: impl IntoIterator<Item = Row>) -> Result<(), BufferError> {
        for row in rows {
            self.push(row)?;
        }
        Ok(())
    }

    /// Declare the dimension set and its order before any row arrives.
    pub fn set_dimensions(&mut self, dimensions: Vec<String>) {
        self.dimensions = dimensions;
    }

    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The newest row, if any.
    pub fn last(&self) -> Option<&Row> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The analysis window for the given tick limit.
    pub fn window(&self, data_ticks: Option<usize>) -> &[Row] {
        select_window(&self.rows, data_ticks)
    }

    /// Drop every row and forget the dimension set.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.dimensions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(count: i64) -> Vec<Row> {
        (0..count)
            .map(|i| Row::from_values(i * 1000, [("a", i as f64), ("b", 1.0)]))
            .collect()
    }

    #[test]
    fn test_select_window_tail() {
        let buffer = rows(10);
        let window = select_window(&buffer, Some(3));

        assert_eq!(window.len(), 3);
        assert_eq!(window[0].timestamp, 7000);
        assert_eq!(window[2].timestamp, 9000);
    }

    #[test]
    fn test_select_window_no_limit() {
        let buffer = rows(5);

        assert_eq!(select_window(&buffer, None).len(), 5);
        assert_eq!(select_window(&buffer, Some(0)).len(), 5);
        assert_eq!(select_window(&buffer, Some(50)).len(), 5);
        assert!(select_window(&[], Some(3)).is_empty());
    }

    #[test]
    fn test_buffer_rejects_out_of_order() {
        let mut buffer = RowBuffer::new();
        buffer.push(Row::from_values(10, [("a", 1.0)])).unwrap();

        let err = buffer.push(Row::from_values(5, [("a", 1.0)])).unwrap_err();
        assert_eq!(
            err,
            BufferError::OutOfOrder {
                last: 10,
                received: 5
            }
        );
    }

    #[test]
    fn test_buffer_rejects_dimension_change() {
        let mut buffer = RowBuffer::new();
        buffer.push(Row::from_values(1, [("a", 1.0), ("b", 1.0)])).unwrap();

        let result = buffer.push(Row::from_values(2, [("a", 1.0), ("c", 1.0)]));
        assert!(matches!(
            result,
            Err(BufferError::DimensionMismatch { .. })
        ));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_buffer_capacity_drops_oldest() {
        let mut buffer = RowBuffer::with_capacity(4);
        buffer.extend(rows(6)).unwrap();

        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.rows()[0].timestamp, 2000);
        assert_eq!(buffer.window(Some(2))[0].timestamp, 4000);
        assert_eq!(buffer.dimensions(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_buffer_keeps_declared_order() {
        let mut buffer = RowBuffer::new();
        buffer.set_dimensions(vec!["b".to_string(), "a".to_string()]);
        buffer.extend(rows(2)).unwrap();
        assert_eq!(buffer.dimensions(), &["b".to_string(), "a".to_string()]);

        let result = buffer.push(Row::from_values(5000, [("b", 1.0)]));
        assert!(matches!(
            result,
            Err(BufferError::DimensionMismatch { expected: 2, received: 1 })
        ));
    }

    #[test]
    fn test_buffer_checks_first_row_against_declared_dimensions() {
        let mut buffer = RowBuffer::new();
        buffer.set_dimensions(vec!["a".to_string(), "z".to_string()]);

        let result = buffer.push(Row::from_values(0, [("a", 1.0), ("b", 1.0)]));
        assert!(matches!(
            result,
            Err(BufferError::DimensionMismatch { .. })
        ));
        assert!(buffer.is_empty());
    }
}
