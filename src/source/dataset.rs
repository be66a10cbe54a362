//! JSON datasets.
//!
//! A dataset file is a JSON array of flat objects, one per row:
//!
//! ```json
//! [
//!   { "timestamp": 1700000000000, "cpu": 0.42, "mem": 0.61 },
//!   { "timestamp": 1700000001000, "cpu": 0.40, "mem": 0.62 }
//! ]
//! ```
//!
//! The first row fixes the dimension set, in the order its keys appear in
//! the file. Loading fails if a later row carries different keys or goes
//! back in time.

use crate::core::types::Row;
use crate::core::windowing::{BufferError, RowBuffer};
use serde_json::{Map, Value};
use std::path::Path;

const TIMESTAMP_KEY: &str = "timestamp";

/// Errors raised while reading or writing a dataset.
#[derive(Debug)]
pub enum DatasetError {
    IoError(String),
    ParseError(String),
    /// Row `index` does not fit the rows before it
    InvalidRow { index: usize, source: BufferError },
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::IoError(e) => write!(f, "IO error: {e}"),
            DatasetError::ParseError(e) => write!(f, "Parse error: {e}"),
            DatasetError::InvalidRow { index, source } => {
                write!(f, "Invalid row {index}: {source}")
            }
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DatasetError::InvalidRow { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Rows plus the dimension names they share.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub dimensions: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Validate rows and collect their dimension names in sorted order.
    pub fn from_rows(rows: Vec<Row>) -> Result<Self, DatasetError> {
        Self::with_dimensions(Vec::new(), rows)
    }

    /// Validate rows against an explicit dimension order.
    ///
    /// An empty `dimensions` takes the set from the first row.
    pub fn with_dimensions(dimensions: Vec<String>, rows: Vec<Row>) -> Result<Self, DatasetError> {
        let mut buffer = RowBuffer::new();
        buffer.set_dimensions(dimensions);
        for (index, row) in rows.into_iter().enumerate() {
            buffer
                .push(row)
                .map_err(|source| DatasetError::InvalidRow { index, source })?;
        }
        Ok(Self {
            dimensions: buffer.dimensions().to_vec(),
            rows: buffer.rows().to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a dataset from JSON text.
///
/// Dimensions keep the key order of the first object.
pub fn parse_dataset(json: &str) -> Result<Dataset, DatasetError> {
    let objects: Vec<Map<String, Value>> =
        serde_json::from_str(json).map_err(|e| DatasetError::ParseError(e.to_string()))?;

    let dimensions: Vec<String> = objects
        .first()
        .map(|object| {
            object
                .keys()
                .filter(|key| key.as_str() != TIMESTAMP_KEY)
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    let rows = objects
        .into_iter()
        .enumerate()
        .map(|(index, object)| {
            serde_json::from_value::<Row>(Value::Object(object))
                .map_err(|e| DatasetError::ParseError(format!("row {index}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Dataset::with_dimensions(dimensions, rows)
}

/// Load a dataset file.
pub fn load_dataset(path: &Path) -> Result<Dataset, DatasetError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| DatasetError::IoError(format!("{}: {e}", path.display())))?;
    let dataset = parse_dataset(&content)?;
    tracing::info!(
        path = %path.display(),
        rows = dataset.len(),
        dimensions = dataset.dimensions.len(),
        "Loaded dataset"
    );
    Ok(dataset)
}

/// Write rows as a dataset file, with columns in `dimensions` order.
pub fn save_dataset(path: &Path, dimensions: &[String], rows: &[Row]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| DatasetError::IoError(e.to_string()))?;
    }
    let objects: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            object.insert(TIMESTAMP_KEY.to_string(), Value::from(row.timestamp));
            for dimension in dimensions {
                object.insert(dimension.clone(), Value::from(row.value(dimension)));
            }
            Value::Object(object)
        })
        .collect();
    let json = serde_json::to_string_pretty(&objects)
        .map_err(|e| DatasetError::ParseError(e.to_string()))?;
    std::fs::write(path, json).map_err(|e| DatasetError::IoError(e.to_string()))?;
    Ok(())
}
