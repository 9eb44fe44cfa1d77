//! Forest training configuration with builder pattern.
//!
//! [`ForestConfig`] uses the `bon` crate for builder generation with
//! validation at build time, and serde so the same struct can be embedded in
//! the pipeline config file and in the model artifact.
//!
//! # Example
//!
//! ```
//! use maize_yield::training::{ForestConfig, MaxFeatures};
//!
//! // All defaults
//! let config = ForestConfig::builder().build().unwrap();
//! assert_eq!(config.n_trees, 200);
//!
//! let config = ForestConfig::builder()
//!     .n_trees(50)
//!     .max_depth(6)
//!     .max_features(MaxFeatures::Sqrt)
//!     .build()
//!     .unwrap();
//! ```

use std::path::PathBuf;

use bon::Builder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ConfigError
// =============================================================================

/// Invalid training or pipeline parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("n_trees must be at least 1")]
    InvalidNTrees,

    #[error("max_depth must be at least 1")]
    InvalidMaxDepth,

    #[error("{field} must be at least {min}, got {value}")]
    InvalidMinSamples {
        field: &'static str,
        min: usize,
        value: usize,
    },

    #[error("{field} must be in (0, 1], got {value}")]
    InvalidSamplingRatio { field: &'static str, value: f64 },

    #[error("max_features count must be at least 1")]
    InvalidMaxFeatures,

    #[error("test_fraction must be in (0, 1), got {0}")]
    InvalidTestFraction(f64),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// MaxFeatures
// =============================================================================

/// Number of features considered at each split.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature (plain bagging).
    All,
    /// `ceil(sqrt(n_features))`.
    Sqrt,
    /// `ceil(n_features / 3)`, the usual choice for regression forests.
    #[default]
    Third,
    /// `ceil(fraction * n_features)`, fraction in (0, 1].
    Fraction(f64),
    /// A fixed count, capped at `n_features`.
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete count in `1..=n_features`.
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().ceil() as usize,
            MaxFeatures::Third => n_features.div_ceil(3),
            MaxFeatures::Fraction(f) => (f * n_features as f64).ceil() as usize,
            MaxFeatures::Count(k) => k,
        };
        k.clamp(1, n_features.max(1))
    }
}

// =============================================================================
// ForestConfig
// =============================================================================

/// Configuration for training a bagged regression forest.
///
/// Depth is counted in split levels: `max_depth = 3` allows at most three
/// splits on any root-to-leaf path.
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(derive(Clone, Debug), finish_fn(vis = "", name = __build_internal))]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees. Default: 200.
    #[builder(default = 200)]
    pub n_trees: u32,

    /// Maximum number of split levels. Default: 12.
    #[builder(default = 12)]
    pub max_depth: u32,

    /// Minimum bootstrap rows required to split a node. Default: 2.
    #[builder(default = 2)]
    pub min_samples_split: usize,

    /// Minimum bootstrap rows in each child. Default: 1.
    #[builder(default = 1)]
    pub min_samples_leaf: usize,

    /// Features considered per split. Default: a third.
    #[builder(default)]
    pub max_features: MaxFeatures,

    /// Rows drawn per tree, as a fraction of the training set. Default: 1.0.
    #[builder(default = 1.0)]
    pub subsample: f64,

    /// Draw rows with replacement. Default: true.
    #[builder(default = true)]
    pub bootstrap: bool,

    /// Random seed. Default: 42.
    #[builder(default = 42)]
    pub seed: u64,

    /// Worker threads: 0 = auto, 1 = sequential. Default: 0.
    #[builder(default = 0)]
    pub n_threads: usize,
}

impl<S: forest_config_builder::IsComplete> ForestConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any parameter is out of range.
    pub fn build(self) -> Result<ForestConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ForestConfig {
    /// Validate the configuration.
    ///
    /// Called by the builder; call it explicitly on configs obtained through
    /// serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_trees == 0 {
            return Err(ConfigError::InvalidNTrees);
        }
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidMaxDepth);
        }
        if self.min_samples_split < 2 {
            return Err(ConfigError::InvalidMinSamples {
                field: "min_samples_split",
                min: 2,
                value: self.min_samples_split,
            });
        }
        if self.min_samples_leaf < 1 {
            return Err(ConfigError::InvalidMinSamples {
                field: "min_samples_leaf",
                min: 1,
                value: self.min_samples_leaf,
            });
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ConfigError::InvalidSamplingRatio {
                field: "subsample",
                value: self.subsample,
            });
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(ConfigError::InvalidSamplingRatio {
                    field: "max_features",
                    value: f,
                });
            }
            MaxFeatures::Count(0) => return Err(ConfigError::InvalidMaxFeatures),
            _ => {}
        }
        Ok(())
    }
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self::builder().__build_internal()
    }
}
