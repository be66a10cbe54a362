//! Row sources: synthetic generators and JSON datasets.

pub mod dataset;
pub mod generator;

pub use dataset::{load_dataset, parse_dataset, save_dataset, Dataset, DatasetError};
pub use generator::{GeneratorConfig, GeneratorMode, RowGenerator};
