//! Caller-owned model holder for serving predictions.
//!
//! A [`ModelHandle`] wraps an `Arc<YieldModel>` together with the artifact
//! path it came from. There is no process-wide cache: whoever needs the model
//! keeps a handle (or clones [`ModelHandle::shared`]) and calls
//! [`ModelHandle::reload`] when a retrain has replaced the artifact.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::explainability::AttributionResult;
use crate::model::{ModelLoadError, YieldModel};
use crate::schema::FeatureVector;

/// Explicit holder of the active model.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    model: Arc<YieldModel>,
    source: Option<PathBuf>,
}

impl ModelHandle {
    /// Wrap an in-memory model.
    pub fn from_model(model: YieldModel) -> Self {
        Self { model: Arc::new(model), source: None }
    }

    /// Load the artifact at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        let model = YieldModel::load(path)?;
        Ok(Self { model: Arc::new(model), source: Some(path.to_owned()) })
    }

    /// Load the artifact at `path`, or fall back to [`YieldModel::demo`] when
    /// no file exists there.
    ///
    /// Only absence triggers the fallback; an artifact that exists but fails
    /// to load is reported as an error. The fallback handle is
    /// non-authoritative.
    pub fn load_or_demo(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        match YieldModel::load(path) {
            Ok(model) => Ok(Self { model: Arc::new(model), source: Some(path.to_owned()) }),
            Err(ModelLoadError::NotFound { .. }) => {
                warn!(
                    path = %path.display(),
                    "no trained model found, using the demo model; predictions are not authoritative"
                );
                Ok(Self { model: Arc::new(YieldModel::demo()), source: Some(path.to_owned()) })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read the artifact this handle was loaded from.
    ///
    /// Returns `Ok(false)` for in-memory handles. On error the current model
    /// stays active.
    pub fn reload(&mut self) -> Result<bool, ModelLoadError> {
        let Some(path) = &self.source else {
            return Ok(false);
        };
        self.model = Arc::new(YieldModel::load(path)?);
        Ok(true)
    }

    pub fn model(&self) -> &YieldModel {
        &self.model
    }

    /// A cheap clone of the current model for another thread.
    pub fn shared(&self) -> Arc<YieldModel> {
        Arc::clone(&self.model)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_authoritative(&self) -> bool {
        self.model.is_authoritative()
    }

    /// Predicted yield in t/ha. Warns about inputs outside documented ranges.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        warn_out_of_range(features);
        self.model.predict(features)
    }

    /// Attribution of one prediction. Warns about inputs outside documented
    /// ranges.
    pub fn explain(&self, features: &FeatureVector) -> AttributionResult {
        warn_out_of_range(features);
        self.model.explain(features)
    }
}

fn warn_out_of_range(features: &FeatureVector) {
    let fields = features.out_of_range();
    if !fields.is_empty() {
        warn!(?fields, "inputs outside documented ranges");
    }
}
