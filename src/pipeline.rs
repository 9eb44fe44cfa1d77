//! Offline training pipeline: load → split → fit → evaluate → persist.
//!
//! ```no_run
//! use maize_yield::pipeline::{PipelineConfig, TrainingPipeline};
//!
//! let config = PipelineConfig::from_json_file("configs/train.json")?;
//! let outcome = TrainingPipeline::new(config).run()?;
//! println!("model written to {}", outcome.model_path.display());
//! # Ok::<(), maize_yield::Error>(())
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{load_dataset_with, CsvOptions, SplitIndices, TrainingDataset};
use crate::error::Error;
use crate::model::YieldModel;
use crate::training::{evaluate, ConfigError, EvalError, EvaluationReport, ForestConfig};

// =============================================================================
// PipelineConfig
// =============================================================================

/// Everything a training run needs. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Training CSV. Default: `data/processed/maize_yield.csv`.
    pub data_path: PathBuf,
    /// Artifact destination. Default: `models/maize_yield.forest`.
    pub model_path: PathBuf,
    /// Share of each region held out for evaluation, in (0, 1). Default: 0.2.
    pub test_fraction: f64,
    /// Seed of the stratified split. Default: 42.
    pub split_seed: u64,
    /// Label column. Default: `yield_t_ha`.
    pub label_column: String,
    /// Region column. Default: `region`.
    pub region_column: String,
    pub forest: ForestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/processed/maize_yield.csv"),
            model_path: PathBuf::from("models/maize_yield.forest"),
            test_fraction: 0.2,
            split_seed: 42,
            label_column: "yield_t_ha".into(),
            region_column: "region".into(),
            forest: ForestConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_owned(), source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ConfigError::InvalidTestFraction(self.test_fraction));
        }
        self.forest.validate()
    }

    /// CSV column resolution: the configured names first, then the known
    /// aliases.
    pub fn csv_options(&self) -> CsvOptions {
        let defaults = CsvOptions::default();
        let with_preferred = |preferred: &str, aliases: Vec<String>| {
            let mut names = vec![preferred.to_owned()];
            names.extend(aliases.into_iter().filter(|a| a != preferred));
            names
        };
        CsvOptions {
            label_columns: with_preferred(&self.label_column, defaults.label_columns),
            region_columns: with_preferred(&self.region_column, defaults.region_columns),
            delimiter: defaults.delimiter,
        }
    }
}

// =============================================================================
// TrainingPipeline
// =============================================================================

/// Result of a successful run.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: YieldModel,
    /// Held-out accuracy, or why it could not be computed.
    pub evaluation: Result<EvaluationReport, EvalError>,
    pub model_path: PathBuf,
    pub n_train: usize,
    pub n_test: usize,
}

/// Runs the training stages in order.
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the CSV at `data_path` and run every stage.
    ///
    /// Nothing is written unless loading, splitting and fitting succeed. An
    /// evaluation failure is logged and returned in the outcome; the model is
    /// still persisted.
    pub fn run(&self) -> Result<TrainingOutcome, Error> {
        self.config.validate()?;
        info!(path = %self.config.data_path.display(), "loading training data");
        let dataset = load_dataset_with(&self.config.data_path, &self.config.csv_options())?;
        self.run_on(&dataset)
    }

    /// Run split, fit, evaluate and persist on an in-memory dataset.
    pub fn run_on(&self, dataset: &TrainingDataset) -> Result<TrainingOutcome, Error> {
        let config = &self.config;
        config.validate()?;

        let split =
            SplitIndices::stratified(dataset.regions(), config.test_fraction, config.split_seed)?;
        let train = dataset.select(&split.train)?;
        info!(n_train = split.train.len(), n_test = split.test.len(), "split dataset");

        let model = YieldModel::fit(&train, config.forest.clone())?;

        let evaluation = if split.test.is_empty() {
            Err(EvalError::EmptyTestSet)
        } else {
            let test = dataset.select(&split.test)?;
            evaluate(&model, &test)
        };
        if let Err(e) = &evaluation {
            warn!(error = %e, "evaluation failed, persisting the model anyway");
        }

        model.persist(&config.model_path)?;
        info!(path = %config.model_path.display(), "training run complete");

        Ok(TrainingOutcome {
            model,
            evaluation,
            model_path: config.model_path.clone(),
            n_train: split.train.len(),
            n_test: split.test.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_dataset;
    use ndarray::Array2;

    fn quick_config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            model_path: dir.join("models").join("model.forest"),
            forest: ForestConfig::builder()
                .n_trees(10)
                .max_depth(6)
                .n_threads(1)
                .build()
                .unwrap(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.model_path, PathBuf::from("models/maize_yield.forest"));
        assert_eq!(config.test_fraction, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_overrides_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"test_fraction": 0.3, "forest": {"n_trees": 5}}"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.test_fraction, 0.3);
        assert_eq!(config.forest.n_trees, 5);
        assert_eq!(config.forest.max_depth, 12);
        assert_eq!(config.region_column, "region");
    }

    #[test]
    fn json_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(dir.path().join("absent.json")),
            Err(ConfigError::Read { .. })
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(PipelineConfig::from_json_file(&path), Err(ConfigError::Parse { .. })));

        std::fs::write(&path, r#"{"test_fraction": 1.5}"#).unwrap();
        assert!(matches!(
            PipelineConfig::from_json_file(&path),
            Err(ConfigError::InvalidTestFraction(_))
        ));
    }

    #[test]
    fn csv_options_prefer_configured_columns() {
        let config = PipelineConfig { region_column: "country".into(), ..PipelineConfig::default() };
        let options = config.csv_options();
        assert_eq!(options.region_columns, vec!["country".to_owned(), "region".to_owned()]);
        assert_eq!(options.label_columns[0], "yield_t_ha");
    }

    #[test]
    fn run_on_persists_and_evaluates() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        let outcome = TrainingPipeline::new(config.clone()).run_on(&synthetic_dataset(200, 0.1, 4)).unwrap();

        assert_eq!(outcome.n_train + outcome.n_test, 200);
        assert_eq!(outcome.n_test, 40);
        let report = outcome.evaluation.unwrap();
        assert_eq!(report.n_samples, 40);
        assert!(config.model_path.exists());
        assert_eq!(YieldModel::load(&config.model_path).unwrap(), outcome.model);
    }

    #[test]
    fn empty_test_set_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = quick_config(dir.path());
        // one row per region: nothing can be held out
        let features = Array2::from_elem((3, crate::schema::N_FEATURES), 1.0);
        let dataset = TrainingDataset::new(
            features,
            ndarray::array![1.0, 2.0, 3.0],
            vec!["a".into(), "b".into(), "c".into()],
        )
        .unwrap();

        let outcome = TrainingPipeline::new(config.clone()).run_on(&dataset).unwrap();
        assert_eq!(outcome.evaluation, Err(EvalError::EmptyTestSet));
        assert_eq!(outcome.n_train, 3);
        assert!(config.model_path.exists());
    }

    #[test]
    fn invalid_config_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig { test_fraction: 0.0, ..quick_config(dir.path()) };
        let result = TrainingPipeline::new(config.clone()).run_on(&synthetic_dataset(20, 0.1, 1));
        assert!(matches!(result, Err(Error::Config(ConfigError::InvalidTestFraction(_)))));
        assert!(!config.model_path.exists());
    }
}
