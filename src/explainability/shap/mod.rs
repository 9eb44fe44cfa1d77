//! SHAP (SHapley Additive exPlanations) values for the averaging forest.
//!
//! - [`TreeExplainer`]: exact path-dependent TreeSHAP
//! - [`ShapValues`]: batch container with additivity verification
//! - [`AttributionResult`]: named, single-row attribution returned to callers

mod attribution;
mod path;
mod tree_explainer;
mod values;

pub use attribution::{AttributionResult, Contribution};
pub use path::{PathElement, PathState};
pub use tree_explainer::TreeExplainer;
pub use values::ShapValues;
