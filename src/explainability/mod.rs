//! Explainability: per-prediction attributions and global feature importance.
//!
//! # Feature Importance
//!
//! Aggregated from the split statistics stored in every tree:
//! - **Split**: Number of times each feature is used in splits
//! - **Gain**: Total squared-error reduction from splits using each feature
//! - **AverageGain**: Gain divided by split count
//! - **Cover**: Total cover (bootstrap rows) at nodes using each feature
//! - **AverageCover**: Cover divided by split count
//!
//! # SHAP
//!
//! [`TreeExplainer`] computes exact path-dependent TreeSHAP values; see the
//! [`shap`] module.

mod importance;
pub mod shap;

pub use importance::{compute_forest_importance, FeatureImportance, ImportanceType};
pub use shap::{AttributionResult, Contribution, ShapValues, TreeExplainer};
