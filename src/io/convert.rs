//! Conversion between [`YieldModel`] and the artifact payload.
//!
//! ```ignore
//! let bytes = model.to_bytes()?;
//! let restored = YieldModel::from_bytes(&bytes)?;
//! ```

use crate::io::native::{DeserializeError, FormatFlags, FormatHeader, NativeCodec, SerializeError};
use crate::io::payload::{Payload, PayloadV1, TreePayload};
use crate::model::{ModelMeta, ModelProvenance, YieldModel};
use crate::repr::{Forest, Tree};

// ============================================================================
// Byte API
// ============================================================================

impl YieldModel {
    /// Serialize header and payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let mut header = FormatHeader::new(self.forest().n_features() as u32);
        if self.meta().provenance == ModelProvenance::Demo {
            header.flags.set(FormatFlags::DEMO);
        }
        NativeCodec::new().serialize(header, &Payload::from_model(self))
    }

    /// Decode a complete artifact.
    ///
    /// Checks the framing and payload layout only; schema and structural
    /// validation happen in [`YieldModel::load`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializeError> {
        let (header, payload): (FormatHeader, Payload) = NativeCodec::new().deserialize(bytes)?;
        let model = payload.into_model()?;
        if header.n_features as usize != model.forest().n_features() {
            return Err(DeserializeError::CorruptPayload(format!(
                "header declares {} features, payload has {}",
                header.n_features,
                model.forest().n_features()
            )));
        }
        let flagged_demo = header.flags.contains(FormatFlags::DEMO);
        if flagged_demo != (model.provenance() == ModelProvenance::Demo) {
            return Err(DeserializeError::CorruptPayload(format!(
                "header demo flag is {flagged_demo}, payload provenance is {:?}",
                model.provenance()
            )));
        }
        Ok(model)
    }
}

// ============================================================================
// Model <-> Payload
// ============================================================================

impl Payload {
    pub fn from_model(model: &YieldModel) -> Self {
        Payload::V1(PayloadV1 {
            meta: model.meta().clone(),
            trees: model.forest().trees().map(tree_to_payload).collect(),
        })
    }

    pub fn into_model(self) -> Result<YieldModel, DeserializeError> {
        match self {
            Payload::V1(v1) => {
                let n_features = v1.meta.feature_names.len();
                let trees = v1
                    .trees
                    .into_iter()
                    .enumerate()
                    .map(|(idx, tree)| payload_to_tree(idx, tree))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(YieldModel::from_parts(Forest::from_trees(trees, n_features), v1.meta))
            }
        }
    }

    pub fn meta(&self) -> &ModelMeta {
        match self {
            Payload::V1(v1) => &v1.meta,
        }
    }
}

fn tree_to_payload(tree: &Tree) -> TreePayload {
    TreePayload {
        num_nodes: tree.n_nodes() as u32,
        split_features: tree.split_features().to_vec(),
        thresholds: tree.thresholds().to_vec(),
        left_children: tree.left_children().to_vec(),
        right_children: tree.right_children().to_vec(),
        is_leaf: tree.leaf_flags().to_vec(),
        leaf_values: tree.leaf_values().to_vec(),
        covers: tree.covers().to_vec(),
        gains: tree.gains().to_vec(),
    }
}

fn payload_to_tree(tree_idx: usize, payload: TreePayload) -> Result<Tree, DeserializeError> {
    if !payload.is_consistent() {
        return Err(DeserializeError::CorruptPayload(format!(
            "tree {tree_idx}: node arrays disagree with num_nodes = {}",
            payload.num_nodes
        )));
    }
    Ok(Tree::new(
        payload.split_features,
        payload.thresholds,
        payload.left_children,
        payload.right_children,
        payload.is_leaf,
        payload.leaf_values,
        payload.covers,
        payload.gains,
    ))
}

// ============================================================================
// Tests
// ============================================================================
