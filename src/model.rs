//! The fitted yield model: forest plus metadata.
//!
//! [`YieldModel`] is immutable once built. It is produced by [`YieldModel::fit`],
//! [`YieldModel::load`] or, explicitly, [`YieldModel::demo`], and shared
//! read-only (it is `Send + Sync`).
//!
//! ```no_run
//! use maize_yield::model::YieldModel;
//! use maize_yield::schema::FeatureVector;
//!
//! let model = YieldModel::load("models/maize_yield.forest")?;
//! let x = FeatureVector::new([0.6, 180.0, 23.0, 6.1, 1.4, 1200.0, 3.0, 320.0])?;
//! let attribution = model.explain(&x);
//! println!("{:.2} t/ha", attribution.prediction);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, ArrayView2};
use rand::prelude::*;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::data::TrainingDataset;
use crate::explainability::{
    compute_forest_importance, AttributionResult, FeatureImportance, ImportanceType, ShapValues,
    TreeExplainer,
};
use crate::io::{DeserializeError, SerializeError};
use crate::repr::{Forest, ForestValidationError};
use crate::schema::{feature_name_vec, FeatureVector, SchemaError, FEATURES, N_FEATURES};
use crate::training::{ForestConfig, ForestTrainer, MaxFeatures, TrainError};
use crate::utils::Parallelism;

// =============================================================================
// Metadata
// =============================================================================

/// How a model came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvenance {
    /// Fitted on real training data.
    Trained,
    /// Built-in synthetic model; its outputs are not a forecast.
    Demo,
}

/// Metadata stored alongside the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    /// Feature names in the order the forest indexes them.
    pub feature_names: Vec<String>,
    pub n_train_samples: usize,
    pub config: ForestConfig,
    pub provenance: ModelProvenance,
}

// =============================================================================
// Errors
// =============================================================================

/// An artifact could not be turned into a usable model.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("failed to read model artifact {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("model artifact {path} is invalid")]
    Format {
        path: PathBuf,
        #[source]
        source: DeserializeError,
    },

    #[error("model artifact {path} was trained on features {found:?}, expected {expected:?}")]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model artifact {path} contains an invalid forest")]
    InvalidForest {
        path: PathBuf,
        #[source]
        source: ForestValidationError,
    },
}

/// An artifact could not be written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to encode model for {path}")]
    Encode {
        path: PathBuf,
        #[source]
        source: SerializeError,
    },

    #[error("failed to write model artifact {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// =============================================================================
// YieldModel
// =============================================================================

/// A trained forest with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldModel {
    forest: Forest,
    meta: ModelMeta,
}

impl YieldModel {
    pub(crate) fn from_parts(forest: Forest, meta: ModelMeta) -> Self {
        Self { forest, meta }
    }

    /// Fit a forest on `train`.
    pub fn fit(train: &TrainingDataset, config: ForestConfig) -> Result<Self, TrainError> {
        let forest = ForestTrainer::new(config.clone()).train(train)?;
        Ok(Self {
            forest,
            meta: ModelMeta {
                feature_names: feature_name_vec(),
                n_train_samples: train.n_samples(),
                config,
                provenance: ModelProvenance::Trained,
            },
        })
    }

    /// Small synthetic model for demos and smoke tests.
    ///
    /// Ten trees of depth three fitted on 100 seeded rows with every feature
    /// uniform in `[0, 1)` and `y = 1.5 + 0.8 f0 + 0.5 f1 + N(0, 0.2)`.
    /// Marked [`ModelProvenance::Demo`]; never returned implicitly by
    /// [`YieldModel::load`].
    pub fn demo() -> Self {
        const ROWS: usize = 100;
        let mut rng = StdRng::seed_from_u64(42);
        let features = Array2::from_shape_fn((ROWS, N_FEATURES), |_| rng.gen::<f64>());
        let targets: Array1<f64> = features
            .rows()
            .into_iter()
            .map(|row| {
                let noise: f64 = rng.sample(StandardNormal);
                1.5 + 0.8 * row[0] + 0.5 * row[1] + 0.2 * noise
            })
            .collect();
        let regions = vec!["demo".to_owned(); ROWS];
        let data = TrainingDataset::from_finite(features, targets, regions);

        let config = ForestConfig {
            n_trees: 10,
            max_depth: 3,
            max_features: MaxFeatures::All,
            seed: 42,
            n_threads: 1,
            ..ForestConfig::default()
        };
        let forest = ForestTrainer::new(config.clone()).grow_forest(&data, Parallelism::Sequential);

        Self {
            forest,
            meta: ModelMeta {
                feature_names: feature_name_vec(),
                n_train_samples: ROWS,
                config,
                provenance: ModelProvenance::Demo,
            },
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn meta(&self) -> &ModelMeta {
        &self.meta
    }

    pub fn provenance(&self) -> ModelProvenance {
        self.meta.provenance
    }

    /// `false` for the demo model: its outputs must not be shown as a
    /// forecast.
    pub fn is_authoritative(&self) -> bool {
        self.meta.provenance == ModelProvenance::Trained
    }

    /// Expected prediction over the training data (the attribution baseline).
    pub fn baseline(&self) -> f64 {
        self.forest.expected_value()
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Predicted yield in t/ha.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        self.forest.predict_row(features.as_slice())
    }

    /// Predictions for a `[n_rows, N_FEATURES]` matrix in schema order.
    pub fn predict_batch(&self, features: ArrayView2<'_, f64>) -> Result<Array1<f64>, SchemaError> {
        check_batch(features)?;
        Ok(self.predict_rows(features))
    }

    /// Predictions for every row of a dataset.
    pub fn predict_dataset(&self, dataset: &TrainingDataset) -> Array1<f64> {
        self.predict_rows(dataset.features())
    }

    fn predict_rows(&self, features: ArrayView2<'_, f64>) -> Array1<f64> {
        features
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(slice) => self.forest.predict_row(slice),
                None => self.forest.predict_row(&row.to_vec()),
            })
            .collect()
    }

    // =========================================================================
    // Explanation
    // =========================================================================

    /// Per-feature contributions for one prediction, in schema order.
    pub fn explain(&self, features: &FeatureVector) -> AttributionResult {
        let explainer = TreeExplainer::new(&self.forest);
        let values = explainer.explain_row(features.as_slice());
        AttributionResult::from_values(explainer.base_value(), &values, self.predict(features))
    }

    /// SHAP values for a `[n_rows, N_FEATURES]` matrix in schema order.
    pub fn explain_batch(&self, features: ArrayView2<'_, f64>) -> Result<ShapValues, SchemaError> {
        check_batch(features)?;
        Ok(TreeExplainer::new(&self.forest).shap_values(features))
    }

    /// SHAP values for every row of a dataset.
    pub fn explain_dataset(&self, dataset: &TrainingDataset) -> ShapValues {
        TreeExplainer::new(&self.forest).shap_values(dataset.features())
    }

    /// Global importance aggregated from the forest's split statistics.
    pub fn feature_importance(&self, kind: ImportanceType) -> FeatureImportance {
        compute_forest_importance(&self.forest, kind, self.meta.feature_names.clone())
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load and validate an artifact.
    ///
    /// Fails if the file is missing or unreadable, the framing or payload is
    /// corrupt, the stored feature names differ from [`FEATURES`], or the
    /// forest is structurally invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ModelLoadError::NotFound { path: path.to_owned() }
            } else {
                ModelLoadError::Io { path: path.to_owned(), source }
            }
        })?;

        let model = Self::from_bytes(&bytes)
            .map_err(|source| ModelLoadError::Format { path: path.to_owned(), source })?;

        let expected = feature_name_vec();
        if model.meta.feature_names != expected {
            return Err(ModelLoadError::SchemaMismatch {
                path: path.to_owned(),
                expected,
                found: model.meta.feature_names,
            });
        }
        model
            .forest
            .validate()
            .map_err(|source| ModelLoadError::InvalidForest { path: path.to_owned(), source })?;

        info!(
            path = %path.display(),
            n_trees = model.forest.n_trees(),
            provenance = ?model.meta.provenance,
            "loaded model"
        );
        Ok(model)
    }

    /// Write the artifact atomically.
    ///
    /// Creates missing parent directories, writes to a temporary file in the
    /// destination directory, syncs it and renames it over `path`. On failure
    /// an existing artifact at `path` is left untouched.
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let io_err = |source: io::Error| PersistError::Io { path: path.to_owned(), source };

        let bytes = self
            .to_bytes()
            .map_err(|source| PersistError::Encode { path: path.to_owned(), source })?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;

        info!(path = %path.display(), bytes = bytes.len(), "persisted model");
        Ok(())
    }
}

/// Shape and finiteness of a raw feature matrix.
fn check_batch(features: ArrayView2<'_, f64>) -> Result<(), SchemaError> {
    if features.ncols() != N_FEATURES {
        return Err(SchemaError::WrongLength { expected: N_FEATURES, actual: features.ncols() });
    }
    if let Some(((_, col), &value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(SchemaError::NonFinite { field: FEATURES[col].name, value });
    }
    Ok(())
}
