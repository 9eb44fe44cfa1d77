//! Bagged forest: a collection of trees whose outputs are averaged.

use thiserror::Error;

use super::{Tree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    Empty,

    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        #[source]
        error: TreeValidationError,
    },
}

/// Forest of regression trees.
///
/// The prediction is the arithmetic mean of the tree outputs, so every tree
/// carries weight `1 / n_trees`.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<Tree>,
    n_features: usize,
}

impl Forest {
    /// Create an empty forest over `n_features` inputs.
    pub fn new(n_features: usize) -> Self {
        Self { trees: Vec::new(), n_features }
    }

    /// Create a forest from already-built trees.
    pub fn from_trees(trees: Vec<Tree>, n_features: usize) -> Self {
        Self { trees, n_features }
    }

    /// Add a tree.
    pub fn push_tree(&mut self, tree: Tree) {
        self.trees.push(tree);
    }

    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Deepest tree, counted in nodes.
    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Predict a single row (mean of tree outputs).
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.n_features);
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_row(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Expected output over the training rows: the mean of the per-tree
    /// cover-weighted leaf averages.
    pub fn expected_value(&self) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(Tree::expected_value).sum();
        sum / self.trees.len() as f64
    }

    /// Validate every tree against the forest's feature count.
    pub fn validate(&self) -> Result<(), ForestValidationError> {
        if self.trees.is_empty() {
            return Err(ForestValidationError::Empty);
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn build_simple_tree(left_val: f64, right_val: f64, threshold: f64) -> Tree {
        crate::regression_tree! {
            0 => split(0, threshold) -> 1, 2; cover 4.0,
            1 => leaf(left_val); cover 1.0,
            2 => leaf(right_val); cover 3.0,
        }
    }

    #[test]
    fn forest_single_tree() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));

        assert_eq!(forest.predict_row(&[0.3]), 1.0);
        assert_eq!(forest.predict_row(&[0.7]), 2.0);
    }

    #[test]
    fn forest_averages_trees() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.5, 1.5, 0.5));

        assert_abs_diff_eq!(forest.predict_row(&[0.3]), 0.75);
        assert_abs_diff_eq!(forest.predict_row(&[0.7]), 1.75);
    }

    #[test]
    fn expected_value_averages_trees() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(build_simple_tree(0.0, 4.0, 0.5));

        // (0.25*1 + 0.75*2 + 0.25*0 + 0.75*4) / 2
        assert_abs_diff_eq!(forest.expected_value(), (1.75 + 3.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_forest_is_invalid() {
        assert_eq!(Forest::new(8).validate(), Err(ForestValidationError::Empty));
    }

    #[test]
    fn invalid_tree_is_reported_with_index() {
        let mut forest = Forest::new(1);
        forest.push_tree(build_simple_tree(1.0, 2.0, 0.5));
        forest.push_tree(crate::regression_tree! {
            0 => split(4, 0.5) -> 1, 2; cover 2.0,
            1 => leaf(0.0); cover 1.0,
            2 => leaf(1.0); cover 1.0,
        });
        assert!(matches!(
            forest.validate(),
            Err(ForestValidationError::InvalidTree { tree_idx: 1, .. })
        ));
    }
}
