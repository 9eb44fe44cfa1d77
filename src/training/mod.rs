//! Forest training and held-out evaluation.
//!
//! - [`ForestConfig`] / [`MaxFeatures`]: hyperparameters (bon builder + serde)
//! - [`ForestTrainer`]: bagged CART regression trees, trained in parallel
//! - [`Mae`], [`Rmse`], [`RSquared`]: regression metrics
//! - [`evaluate`] / [`EvaluationReport`]: held-out accuracy

mod config;
mod eval;
pub mod grower;
mod metrics;
pub mod sampling;
mod trainer;

pub use config::{ConfigError, ForestConfig, MaxFeatures};
pub use eval::{evaluate, EvalError, EvaluationReport};
pub use metrics::{Mae, MetricFn, RSquared, Rmse};
pub use trainer::{ForestTrainer, TrainError};
