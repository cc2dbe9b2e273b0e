//! Error types for the merkle crate.

use thiserror::Error;

/// Merkle tree error type.
#[derive(Error, Debug)]
pub enum MerkleError {
    /// A commitment tree must hold at least one entry.
    #[error("Commitment tree cannot be empty")]
    EmptyTree,

    /// Leaf index outside the tree.
    #[error("Leaf index {index} out of bounds (tree has {len} entries)")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of entries in the tree.
        len: usize,
    },
}

/// Result type alias for MerkleError.
pub type Result<T> = std::result::Result<T, MerkleError>;
