//! CSV loader for historical yield records.
//!
//! The header row is resolved once against the feature schema; each required
//! column may appear under its canonical name or any alias. Unrelated columns
//! are ignored.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use tracing::{debug, info};

use super::{DataError, TrainingDataset};
use crate::schema::{FEATURES, N_FEATURES};

/// Column naming for the label and stratification key.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Accepted names for the yield column, first match wins.
    pub label_columns: Vec<String>,
    /// Accepted names for the region column, first match wins.
    pub region_columns: Vec<String>,
    /// Field delimiter.
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            label_columns: vec!["yield_t_ha".into(), "yield_tonnes_per_ha".into()],
            region_columns: vec!["region".into(), "country".into()],
            delimiter: b',',
        }
    }
}

/// Load a dataset from a CSV file with default column names.
pub fn load_dataset(path: impl AsRef<Path>) -> Result<TrainingDataset, DataError> {
    load_dataset_with(path, &CsvOptions::default())
}

/// Load a dataset from a CSV file.
pub fn load_dataset_with(
    path: impl AsRef<Path>,
    options: &CsvOptions,
) -> Result<TrainingDataset, DataError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = read_dataset(file, path, options)?;
    info!(path = %path.display(), rows = dataset.n_samples(), "loaded training data");
    Ok(dataset)
}

/// Read a dataset from any reader. `origin` is used for error context only.
pub fn read_dataset<R: Read>(
    reader: R,
    origin: &Path,
    options: &CsvOptions,
) -> Result<TrainingDataset, DataError> {
    let csv_err = |source| DataError::Csv { path: origin.to_path_buf(), source };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let columns = ColumnMap::resolve(&headers, origin, options)?;
    debug!(?columns, "resolved CSV columns");

    let mut values: Vec<f64> = Vec::new();
    let mut targets: Vec<f64> = Vec::new();
    let mut regions: Vec<String> = Vec::new();

    for result in reader.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map_or(0, csv::Position::line);
        for (feature, &col) in FEATURES.iter().zip(columns.features.iter()) {
            values.push(parse_cell(&record, col, line, feature.name, origin)?);
        }
        targets.push(parse_cell(&record, columns.label, line, &headers[columns.label], origin)?);
        regions.push(record.get(columns.region).unwrap_or_default().to_owned());
    }

    if targets.is_empty() {
        return Err(DataError::Empty { path: Some(origin.to_path_buf()) });
    }

    let n_samples = targets.len();
    let features = Array2::from_shape_vec((n_samples, N_FEATURES), values).map_err(|_| {
        DataError::ShapeMismatch {
            what: "feature values",
            expected: n_samples * N_FEATURES,
            actual: 0,
        }
    })?;
    TrainingDataset::new(features, Array1::from(targets), regions)
}

/// Header positions of the required columns.
#[derive(Debug)]
struct ColumnMap {
    features: [usize; N_FEATURES],
    label: usize,
    region: usize,
}

impl ColumnMap {
    fn resolve(
        headers: &csv::StringRecord,
        origin: &Path,
        options: &CsvOptions,
    ) -> Result<Self, DataError> {
        let missing = |column: &str| DataError::MissingColumn {
            path: PathBuf::from(origin),
            column: column.to_owned(),
        };

        let mut features = [0usize; N_FEATURES];
        for (slot, spec) in features.iter_mut().zip(FEATURES.iter()) {
            *slot = headers
                .iter()
                .position(|h| spec.matches(h))
                .ok_or_else(|| missing(spec.name))?;
        }

        let find_any = |names: &[String]| {
            names
                .iter()
                .find_map(|name| headers.iter().position(|h| h == name))
        };
        let label = find_any(&options.label_columns)
            .ok_or_else(|| missing(options.label_columns.first().map_or("yield_t_ha", String::as_str)))?;
        let region = find_any(&options.region_columns)
            .ok_or_else(|| missing(options.region_columns.first().map_or("region", String::as_str)))?;

        Ok(Self { features, label, region })
    }
}

fn parse_cell(
    record: &csv::StringRecord,
    col: usize,
    line: u64,
    column: &str,
    origin: &Path,
) -> Result<f64, DataError> {
    let raw = record.get(col).unwrap_or_default();
    let value: f64 = raw.parse().map_err(|_| DataError::NonNumeric {
        path: origin.to_path_buf(),
        line,
        column: column.to_owned(),
        value: raw.to_owned(),
    })?;
    if !value.is_finite() {
        return Err(DataError::NonFiniteCell {
            path: origin.to_path_buf(),
            line,
            column: column.to_owned(),
            value: raw.to_owned(),
        });
    }
    Ok(value)
}
