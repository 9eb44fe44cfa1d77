//! Serde payload types stored after the artifact header.
//!
//! The payload is versioned independently of the header so that a newer
//! reader can keep decoding older layouts.

use serde::{Deserialize, Serialize};

use crate::model::ModelMeta;

/// Versioned artifact payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(PayloadV1),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadV1 {
    pub meta: ModelMeta,
    pub trees: Vec<TreePayload>,
}

/// One tree as parallel node arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreePayload {
    pub num_nodes: u32,
    pub split_features: Vec<u32>,
    pub thresholds: Vec<f64>,
    pub left_children: Vec<u32>,
    pub right_children: Vec<u32>,
    pub is_leaf: Vec<bool>,
    pub leaf_values: Vec<f64>,
    pub covers: Vec<f64>,
    pub gains: Vec<f64>,
}

impl TreePayload {
    /// All node arrays have `num_nodes` entries.
    pub fn is_consistent(&self) -> bool {
        let n = self.num_nodes as usize;
        [
            self.split_features.len(),
            self.thresholds.len(),
            self.left_children.len(),
            self.right_children.len(),
            self.is_leaf.len(),
            self.leaf_values.len(),
            self.covers.len(),
            self.gains.len(),
        ]
        .iter()
        .all(|&len| len == n)
    }
}
