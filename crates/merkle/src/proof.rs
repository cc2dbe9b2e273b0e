//! Inclusion proofs for commitment trees.

use alloy_primitives::B256;
use lifelist_core::hashing::{compute_internal_hash, compute_leaf_hash};
use serde::{Deserialize, Serialize};

use crate::tree::CommitmentEntry;

/// An inclusion proof for one leaf of a commitment tree.
///
/// Every proof in a given tree has the same number of siblings (the tree is
/// padded to a power of two), so a proof for a wrong guess is structurally
/// indistinguishable from a proof for a right one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionProof {
    /// Index of the proven leaf.
    pub leaf_index: u32,

    /// Sibling hashes along the path from leaf to root.
    pub siblings: Vec<B256>,
}

impl InclusionProof {
    /// Construct a new proof.
    pub fn new(leaf_index: u32, siblings: Vec<B256>) -> Self {
        Self {
            leaf_index,
            siblings,
        }
    }

    /// Verify this proof for an entry against a root hash.
    pub fn verify(&self, entry: &CommitmentEntry, root: B256) -> bool {
        self.compute_root(entry) == root
    }

    /// Compute the root implied by this proof and an entry.
    pub fn compute_root(&self, entry: &CommitmentEntry) -> B256 {
        let mut hash = compute_leaf_hash(&entry.value, &entry.label);
        let mut index = self.leaf_index;

        for sibling in &self.siblings {
            hash = if index & 1 == 0 {
                compute_internal_hash(&hash, sibling)
            } else {
                compute_internal_hash(sibling, &hash)
            };
            index >>= 1;
        }

        hash
    }
}
