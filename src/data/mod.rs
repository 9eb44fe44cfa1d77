//! Training data: records, CSV loading and the stratified train/test split.
//!
//! # Key Types
//!
//! - [`TrainingRecord`] / [`TrainingDataset`]: validated in-memory data
//! - [`load_dataset`] / [`CsvOptions`]: CSV reader with column aliases
//! - [`stratified_split`]: reproducible region-stratified partition
//! - [`DataError`]: every failure in this module, with path/row/column context

mod dataset;
mod io;
mod split;

use std::path::PathBuf;

use thiserror::Error;

pub use dataset::{TrainingDataset, TrainingRecord};
pub use io::{load_dataset, load_dataset_with, read_dataset, CsvOptions};
pub use split::{stratified_split, SplitIndices};

/// Malformed or missing training data.
///
/// Always fatal to a training run.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: required column `{column}` is missing")]
    MissingColumn { path: PathBuf, column: String },

    /// `line` is the 1-based line in the file, header included.
    #[error("{path}:{line}: column `{column}`: `{value}` is not a number")]
    NonNumeric {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    /// A CSV cell parsed to infinity or NaN.
    #[error("{path}:{line}: column `{column}`: `{value}` is not finite")]
    NonFiniteCell {
        path: PathBuf,
        line: u64,
        column: String,
        value: String,
    },

    /// `row` is the 0-based record index of an in-memory dataset.
    #[error("row {row}, column `{column}`: value is not finite")]
    NonFinite { row: usize, column: String },

    #[error("dataset{} contains no records", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    Empty { path: Option<PathBuf> },

    #[error("{what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("test_fraction must be in (0, 1), got {0}")]
    InvalidSplit(f64),
}
