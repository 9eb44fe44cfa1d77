//! TreeSHAP explainer for the averaging forest.
//!
//! Implements path-dependent TreeSHAP (Lundberg, Erion & Lee, 2018,
//! Algorithm 2). Each tree is explained against its own cover-weighted
//! expectation; forest attributions are the mean of the tree attributions,
//! matching the forest's mean prediction.

use ndarray::ArrayView2;

use super::{PathState, ShapValues};
use crate::repr::{Forest, NodeId, Tree};

/// TreeSHAP explainer for a [`Forest`].
///
/// Exact and deterministic: the baseline and every contribution are computed
/// from the covers recorded at training time.
#[derive(Debug, Clone)]
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    base_value: f64,
    max_depth: usize,
}

impl<'a> TreeExplainer<'a> {
    pub fn new(forest: &'a Forest) -> Self {
        Self {
            forest,
            base_value: forest.expected_value(),
            max_depth: forest.max_depth(),
        }
    }

    /// Expected forest output over the training covers.
    #[inline]
    pub fn base_value(&self) -> f64 {
        self.base_value
    }

    /// Contributions for a single row, in feature order.
    pub fn explain_row(&self, features: &[f64]) -> Vec<f64> {
        let mut phi = vec![0.0; self.forest.n_features()];
        let mut path = PathState::with_depth(self.max_depth);
        self.accumulate_row(features, &mut path, &mut phi);
        phi
    }

    /// SHAP values for a batch, one row per sample.
    pub fn shap_values(&self, features: ArrayView2<'_, f64>) -> ShapValues {
        let n_samples = features.nrows();
        let n_features = self.forest.n_features();
        let mut shap = ShapValues::zeros(n_samples, n_features);
        let mut path = PathState::with_depth(self.max_depth);
        let mut phi = vec![0.0; n_features];

        for (sample_idx, row) in features.rows().into_iter().enumerate() {
            let row = row.to_vec();
            phi.iter_mut().for_each(|p| *p = 0.0);
            self.accumulate_row(&row, &mut path, &mut phi);
            for (feature, &value) in phi.iter().enumerate() {
                shap.set(sample_idx, feature, value);
            }
            shap.set_base_value(sample_idx, self.base_value);
        }
        shap
    }

    fn accumulate_row(&self, features: &[f64], path: &mut PathState, phi: &mut [f64]) {
        let n_trees = self.forest.n_trees();
        if n_trees == 0 {
            return;
        }
        let scale = 1.0 / n_trees as f64;
        for tree in self.forest.trees() {
            tree_shap(tree, features, path, phi, scale);
        }
    }
}

/// Add `scale ×` the TreeSHAP values of one tree to `phi`.
///
/// `path` must already be sized for the tree's depth.
fn tree_shap(tree: &Tree, features: &[f64], path: &mut PathState, phi: &mut [f64], scale: f64) {
    let mut walk = Walk { tree, features, path, phi, scale };
    walk.recurse(0, 0, 0, 1.0, 1.0, None);
}

/// State of one tree traversal.
struct Walk<'t, 'p> {
    tree: &'t Tree,
    features: &'t [f64],
    path: &'p mut PathState,
    phi: &'p mut [f64],
    scale: f64,
}

impl Walk<'_, '_> {
    /// Visit `node`. The parent's path occupies
    /// `[parent_start, parent_start + unique_depth)`; this node's segment
    /// starts right after it.
    fn recurse(
        &mut self,
        node: NodeId,
        parent_start: usize,
        unique_depth: usize,
        parent_zero: f64,
        parent_one: f64,
        parent_feature: Option<usize>,
    ) {
        let start = parent_start + unique_depth + 1;
        let mut ud = unique_depth;
        self.path.copy_parent(parent_start, start, ud);
        self.path.extend(start, ud, parent_zero, parent_one, parent_feature);

        let tree = self.tree;
        if tree.is_leaf(node) {
            let leaf_value = tree.leaf_value(node) * self.scale;
            for i in 1..=ud {
                let weight = self.path.unwound_sum(start, ud, i);
                let el = self.path.segment(start, ud)[i];
                if let Some(feature) = el.feature {
                    self.phi[feature] += weight * (el.one_fraction - el.zero_fraction) * leaf_value;
                }
            }
            return;
        }

        let split = tree.split_feature(node);
        let hot = tree.next_node(node, self.features[split]);
        let cold = if hot == tree.left_child(node) {
            tree.right_child(node)
        } else {
            tree.left_child(node)
        };
        let cover = tree.cover(node);
        let hot_zero = tree.cover(hot) / cover;
        let cold_zero = tree.cover(cold) / cover;

        // A feature seen higher up is merged into a single path element.
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(k) = self.path.find(start, ud, split) {
            let el = self.path.segment(start, ud)[k];
            incoming_zero = el.zero_fraction;
            incoming_one = el.one_fraction;
            self.path.unwind(start, ud, k);
            ud -= 1;
        }

        self.recurse(hot, start, ud + 1, hot_zero * incoming_zero, incoming_one, Some(split));
        self.recurse(cold, start, ud + 1, cold_zero * incoming_zero, 0.0, Some(split));
    }
}
