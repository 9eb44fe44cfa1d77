//! Immutable regression tree (SoA) with per-node statistics.
//!
//! Every node carries its *cover* (number of bootstrap rows that reached it,
//! duplicates included) and every split carries its *gain* (reduction in
//! squared error). Covers drive TreeSHAP and the attribution baseline; gains
//! drive feature importance.

use thiserror::Error;

use super::NodeId;

/// Sentinel child index stored for leaves.
pub const NO_CHILD: NodeId = u32::MAX;

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node arrays have inconsistent lengths")]
    LengthMismatch,

    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} was reached twice")]
    DuplicateVisit { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },

    #[error("node {node} splits on feature {feature}, but the model has {n_features} features")]
    FeatureOutOfRange {
        node: NodeId,
        feature: u32,
        n_features: usize,
    },

    #[error("node {node}: child covers {children} do not add up to {cover}")]
    CoverMismatch { node: NodeId, cover: f64, children: f64 },

    #[error("node {node} has a non-finite value")]
    NonFinite { node: NodeId },

    #[error("node {node} has non-positive cover {cover}")]
    NonPositiveCover { node: NodeId, cover: f64 },
}

/// Structure-of-Arrays tree storage.
///
/// Child indices are local to this tree (0 = root). Samples go left when
/// `x[feature] < threshold`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_features: Box<[u32]>,
    thresholds: Box<[f64]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    is_leaf: Box<[bool]>,
    leaf_values: Box<[f64]>,
    covers: Box<[f64]>,
    gains: Box<[f64]>,
}

impl Tree {
    /// Create a tree from parallel arrays (one entry per node).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        split_features: Vec<u32>,
        thresholds: Vec<f64>,
        left_children: Vec<NodeId>,
        right_children: Vec<NodeId>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f64>,
        covers: Vec<f64>,
        gains: Vec<f64>,
    ) -> Self {
        let n_nodes = split_features.len();
        debug_assert_eq!(n_nodes, thresholds.len());
        debug_assert_eq!(n_nodes, left_children.len());
        debug_assert_eq!(n_nodes, right_children.len());
        debug_assert_eq!(n_nodes, is_leaf.len());
        debug_assert_eq!(n_nodes, leaf_values.len());
        debug_assert_eq!(n_nodes, covers.len());
        debug_assert_eq!(n_nodes, gains.len());

        Self {
            split_features: split_features.into_boxed_slice(),
            thresholds: thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            covers: covers.into_boxed_slice(),
            gains: gains.into_boxed_slice(),
        }
    }

    /// A single-leaf tree.
    pub fn constant(value: f64, cover: f64) -> Self {
        Self::new(
            vec![0],
            vec![0.0],
            vec![NO_CHILD],
            vec![NO_CHILD],
            vec![true],
            vec![value],
            vec![cover],
            vec![0.0],
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        self.is_leaf[node as usize]
    }

    #[inline]
    pub fn split_feature(&self, node: NodeId) -> usize {
        self.split_features[node as usize] as usize
    }

    #[inline]
    pub fn threshold(&self, node: NodeId) -> f64 {
        self.thresholds[node as usize]
    }

    #[inline]
    pub fn left_child(&self, node: NodeId) -> NodeId {
        self.left_children[node as usize]
    }

    #[inline]
    pub fn right_child(&self, node: NodeId) -> NodeId {
        self.right_children[node as usize]
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> f64 {
        self.leaf_values[node as usize]
    }

    #[inline]
    pub fn cover(&self, node: NodeId) -> f64 {
        self.covers[node as usize]
    }

    #[inline]
    pub fn gain(&self, node: NodeId) -> f64 {
        self.gains[node as usize]
    }

    pub fn split_features(&self) -> &[u32] {
        &self.split_features
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn left_children(&self) -> &[NodeId] {
        &self.left_children
    }

    pub fn right_children(&self) -> &[NodeId] {
        &self.right_children
    }

    pub fn leaf_flags(&self) -> &[bool] {
        &self.is_leaf
    }

    pub fn leaf_values(&self) -> &[f64] {
        &self.leaf_values
    }

    pub fn covers(&self) -> &[f64] {
        &self.covers
    }

    pub fn gains(&self) -> &[f64] {
        &self.gains
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Child that a sample with value `x` for the node's feature follows.
    #[inline]
    pub fn next_node(&self, node: NodeId, x: f64) -> NodeId {
        if x < self.threshold(node) {
            self.left_child(node)
        } else {
            self.right_child(node)
        }
    }

    /// Leaf reached by `features` (indexed by schema position).
    #[inline]
    pub fn traverse_to_leaf(&self, features: &[f64]) -> NodeId {
        let mut node = 0;
        while !self.is_leaf(node) {
            node = self.next_node(node, features[self.split_feature(node)]);
        }
        node
    }

    /// Leaf value reached by `features`.
    #[inline]
    pub fn predict_row(&self, features: &[f64]) -> f64 {
        self.leaf_value(self.traverse_to_leaf(features))
    }

    /// Maximum root-to-leaf depth, counted in nodes (a single leaf has depth 1).
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0 as NodeId, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            if self.is_leaf(node) {
                max_depth = max_depth.max(depth);
            } else {
                stack.push((self.left_child(node), depth + 1));
                stack.push((self.right_child(node), depth + 1));
            }
        }
        max_depth
    }

    /// Cover-weighted mean of the leaf values.
    ///
    /// This is the tree's expected output over the rows it was grown on, and
    /// the zero point of its TreeSHAP decomposition.
    pub fn expected_value(&self) -> f64 {
        let root_cover = self.cover(0);
        if root_cover <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = (0..self.n_nodes() as NodeId)
            .filter(|&n| self.is_leaf(n))
            .map(|n| self.cover(n) * self.leaf_value(n))
            .sum();
        weighted / root_cover
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate structural invariants.
    ///
    /// Checks that every node is reachable exactly once from the root, that
    /// split features fall inside `n_features`, that all values are finite,
    /// that covers are positive and that child covers add up to the parent
    /// cover. TreeSHAP relies on the last two.
    pub fn validate(&self, n_features: usize) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        let lens = [
            self.split_features.len(),
            self.thresholds.len(),
            self.left_children.len(),
            self.right_children.len(),
            self.leaf_values.len(),
            self.covers.len(),
            self.gains.len(),
        ];
        if lens.iter().any(|&l| l != n_nodes) {
            return Err(TreeValidationError::LengthMismatch);
        }

        let mut visited = vec![false; n_nodes];
        let mut stack: Vec<NodeId> = vec![0];

        while let Some(node) = stack.pop() {
            let idx = node as usize;
            if visited[idx] {
                return Err(TreeValidationError::DuplicateVisit { node });
            }
            visited[idx] = true;

            if !self.leaf_values[idx].is_finite() || !self.covers[idx].is_finite() {
                return Err(TreeValidationError::NonFinite { node });
            }
            if self.covers[idx] <= 0.0 {
                return Err(TreeValidationError::NonPositiveCover { node, cover: self.covers[idx] });
            }
            if self.is_leaf(node) {
                continue;
            }

            let feature = self.split_features[idx];
            if feature as usize >= n_features {
                return Err(TreeValidationError::FeatureOutOfRange { node, feature, n_features });
            }
            if !self.thresholds[idx].is_finite() {
                return Err(TreeValidationError::NonFinite { node });
            }

            let left = self.left_child(node);
            let right = self.right_child(node);
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
            }

            let cover = self.cover(node);
            let children = self.cover(left) + self.cover(right);
            if (cover - children).abs() > 1e-9 * cover.abs().max(1.0) {
                return Err(TreeValidationError::CoverMismatch { node, cover, children });
            }

            stack.push(right);
            stack.push(left);
        }

        if let Some(i) = visited.iter().position(|&v| !v) {
            return Err(TreeValidationError::UnreachableNode { node: i as NodeId });
        }

        Ok(())
    }
}

/// Build a [`Tree`] from a compact node listing (test helper).
///
/// ```ignore
/// let tree = regression_tree! {
///     0 => split(0, 0.5) -> 1, 2; cover 10.0,
///     1 => leaf(-1.0); cover 4.0,
///     2 => leaf(1.0); cover 6.0,
/// };
/// ```
#[macro_export]
macro_rules! regression_tree {
    ($($id:literal => $kind:ident ( $($args:expr),* ) $(-> $l:literal, $r:literal)? ; cover $cover:expr),+ $(,)?) => {{
        let mut nodes: Vec<(u32, u32, f64, u32, u32, bool, f64, f64)> = Vec::new();
        $(
            nodes.push($crate::regression_tree!(@node $id, $kind ( $($args),* ) $(-> $l, $r)?, $cover));
        )+
        nodes.sort_by_key(|n| n.0);
        $crate::repr::Tree::new(
            nodes.iter().map(|n| n.1).collect(),
            nodes.iter().map(|n| n.2).collect(),
            nodes.iter().map(|n| n.3).collect(),
            nodes.iter().map(|n| n.4).collect(),
            nodes.iter().map(|n| n.5).collect(),
            nodes.iter().map(|n| n.6).collect(),
            nodes.iter().map(|n| n.7).collect(),
            vec![0.0; nodes.len()],
        )
    }};
    (@node $id:literal, split ( $feat:expr, $thr:expr ) -> $l:literal, $r:literal, $cover:expr) => {
        ($id as u32, $feat as u32, $thr as f64, $l as u32, $r as u32, false, 0.0f64, $cover as f64)
    };
    (@node $id:literal, leaf ( $val:expr ), $cover:expr) => {
        ($id as u32, 0u32, 0.0f64, $crate::repr::tree::NO_CHILD, $crate::repr::tree::NO_CHILD, true, $val as f64, $cover as f64)
    };
}
