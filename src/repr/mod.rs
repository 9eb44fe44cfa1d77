//! Canonical model representation: regression trees and the averaging forest.

/// Node identifier: an index into a tree's SoA arrays.
pub type NodeId = u32;

pub mod forest;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{Tree, TreeValidationError};
