//! maize-yield: explainable maize yield estimation for smallholder plots.
//!
//! A bagged regression forest is trained offline on historical district
//! records and persisted as a checksummed artifact. At inference time the
//! model predicts yield in t/ha from eight agronomic inputs and decomposes
//! each prediction into exact per-feature contributions with TreeSHAP.
//!
//! # Modules
//!
//! - [`schema`]: the eight features, their order and documented ranges
//! - [`data`]: CSV loading and the stratified split
//! - [`training`]: forest config, trainer and held-out evaluation
//! - [`model`]: [`YieldModel`] with predict, explain, load and persist
//! - [`inference`]: [`ModelHandle`], the caller-owned active model
//! - [`explainability`]: TreeSHAP and feature importance
//! - [`pipeline`]: the end-to-end training run
//! - [`report`]: risk tiers and exported forecast reports
//!
//! # Example
//!
//! ```
//! use maize_yield::{ModelHandle, YieldModel};
//! use maize_yield::schema::FeatureVector;
//!
//! let handle = ModelHandle::from_model(YieldModel::demo());
//! let x = FeatureVector::new([0.7, 0.4, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]).unwrap();
//! let attribution = handle.explain(&x);
//! assert!(attribution.additivity_gap() < 1e-9);
//! assert!(!handle.is_authoritative());
//! ```

pub mod data;
pub mod error;
pub mod explainability;
pub mod inference;
pub mod io;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod repr;
pub mod schema;
pub mod testing;
pub mod training;
pub mod utils;

pub use data::{load_dataset, DataError, TrainingDataset, TrainingRecord};
pub use error::{Error, Result};
pub use explainability::{AttributionResult, Contribution, FeatureImportance, ImportanceType};
pub use inference::ModelHandle;
pub use model::{ModelLoadError, ModelMeta, ModelProvenance, PersistError, YieldModel};
pub use pipeline::{PipelineConfig, TrainingOutcome, TrainingPipeline};
pub use report::{ForecastReport, ReportError, RiskTier};
pub use schema::{FeatureVector, SchemaError, FEATURES, N_FEATURES};
pub use training::{evaluate, EvaluationReport, ForestConfig, MaxFeatures};
