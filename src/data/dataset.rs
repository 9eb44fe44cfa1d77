//! Training records and the in-memory training dataset.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::DataError;
use crate::schema::{FeatureVector, FEATURES, N_FEATURES};

/// One historical observation: features, observed yield and region.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRecord {
    pub features: FeatureVector,
    /// Observed yield in t/ha.
    pub yield_t_ha: f64,
    /// Administrative region, used only to stratify the train/test split.
    pub region: String,
}

/// Ordered collection of training records.
///
/// Stored column-wise for training: a row-major `[n_samples, N_FEATURES]`
/// feature matrix, the label vector and the region vector. Invariants: at
/// least one row, every value finite.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingDataset {
    features: Array2<f64>,
    targets: Array1<f64>,
    regions: Vec<String>,
}

impl TrainingDataset {
    /// Build from parts, checking shape and finiteness.
    pub fn new(
        features: Array2<f64>,
        targets: Array1<f64>,
        regions: Vec<String>,
    ) -> Result<Self, DataError> {
        let features = if features.is_standard_layout() {
            features
        } else {
            features.as_standard_layout().into_owned()
        };
        let (n_samples, n_features) = features.dim();
        if n_samples == 0 {
            return Err(DataError::Empty { path: None });
        }
        if n_features != N_FEATURES {
            return Err(DataError::ShapeMismatch {
                what: "feature columns",
                expected: N_FEATURES,
                actual: n_features,
            });
        }
        if targets.len() != n_samples {
            return Err(DataError::ShapeMismatch {
                what: "labels",
                expected: n_samples,
                actual: targets.len(),
            });
        }
        if regions.len() != n_samples {
            return Err(DataError::ShapeMismatch {
                what: "regions",
                expected: n_samples,
                actual: regions.len(),
            });
        }
        if let Some(((row, col), _)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(DataError::NonFinite { row, column: FEATURES[col].name.into() });
        }
        if let Some(row) = targets.iter().position(|v| !v.is_finite()) {
            return Err(DataError::NonFinite { row, column: "label".into() });
        }

        Ok(Self { features, targets, regions })
    }

    /// Build from parts the caller generated finite and correctly shaped.
    pub(crate) fn from_finite(
        features: Array2<f64>,
        targets: Array1<f64>,
        regions: Vec<String>,
    ) -> Self {
        debug_assert!(features.nrows() > 0 && features.ncols() == N_FEATURES);
        debug_assert_eq!(features.nrows(), targets.len());
        debug_assert_eq!(features.nrows(), regions.len());
        debug_assert!(features.iter().chain(targets.iter()).all(|v| v.is_finite()));
        Self { features, targets, regions }
    }

    /// Build from records.
    pub fn from_records(records: &[TrainingRecord]) -> Result<Self, DataError> {
        let n = records.len();
        let mut features = Array2::zeros((n, N_FEATURES));
        for (mut row, record) in features.axis_iter_mut(Axis(0)).zip(records) {
            row.assign(&ArrayView1::from(record.features.as_slice()));
        }
        let targets = records.iter().map(|r| r.yield_t_ha).collect();
        let regions = records.iter().map(|r| r.region.clone()).collect();
        Self::new(features, targets, regions)
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.targets.len()
    }

    /// Feature matrix, `[n_samples, N_FEATURES]`.
    #[inline]
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    #[inline]
    pub fn targets(&self) -> ArrayView1<'_, f64> {
        self.targets.view()
    }

    #[inline]
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    /// Feature values of one row as a contiguous slice.
    ///
    /// The matrix is kept in standard (row-major) layout, so rows are contiguous.
    #[inline]
    pub fn row(&self, idx: usize) -> &[f64] {
        let start = idx * N_FEATURES;
        let data = self.features.as_slice().unwrap_or(&[]);
        &data[start..start + N_FEATURES]
    }

    /// Record at `idx`.
    pub fn record(&self, idx: usize) -> TrainingRecord {
        let mut values = [0.0; N_FEATURES];
        values.copy_from_slice(self.row(idx));
        TrainingRecord {
            features: FeatureVector::from_finite(values),
            yield_t_ha: self.targets[idx],
            region: self.regions[idx].clone(),
        }
    }

    /// Iterate over records in order.
    pub fn records(&self) -> impl Iterator<Item = TrainingRecord> + '_ {
        (0..self.n_samples()).map(move |i| self.record(i))
    }

    /// Mean observed yield.
    pub fn mean_target(&self) -> f64 {
        self.targets.mean().unwrap_or(0.0)
    }

    /// New dataset with the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self, DataError> {
        let features = self.features.select(Axis(0), indices);
        let targets = self.targets.select(Axis(0), indices);
        let regions = indices.iter().map(|&i| self.regions[i].clone()).collect();
        Self::new(features.as_standard_layout().into_owned(), targets, regions)
    }
}
