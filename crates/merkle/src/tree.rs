//! The per-collection commitment tree.

use alloy_primitives::B256;
use lifelist_core::hashing::{
    compute_internal_hash, compute_leaf_hash, keccak256, species_value_hash, token_species_label,
};
use lifelist_core::types::TokenId;
use serde::{Deserialize, Serialize};

use crate::error::{MerkleError, Result};

/// One committed leaf: a hashed species name bound to a token-specific label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentEntry {
    /// `keccak256(species_name)`.
    pub value: B256,
    /// Label disambiguating token and asset type, e.g. `"42-species"`.
    pub label: String,
}

/// An immutable merkle commitment over a collection's species assignments.
///
/// Leaves are padded to the next power of two with zero hashes so every
/// inclusion proof has identical depth. The tree is read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct CommitmentTree {
    entries: Vec<CommitmentEntry>,
    /// levels[0] holds the padded leaf hashes; the last level is the root.
    levels: Vec<Vec<B256>>,
}

impl CommitmentTree {
    /// Build a tree from its entries.
    pub fn from_entries(entries: Vec<CommitmentEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let padded_len = entries.len().next_power_of_two();
        let mut leaves: Vec<B256> = entries
            .iter()
            .map(|entry| compute_leaf_hash(&entry.value, &entry.label))
            .collect();
        leaves.resize(padded_len, B256::ZERO);

        let mut levels = vec![leaves];
        while levels
            .last()
            .map(|level| level.len() > 1)
            .unwrap_or(false)
        {
            let below = &levels[levels.len() - 1];
            let above = below
                .chunks(2)
                .map(|pair| compute_internal_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(above);
        }

        Ok(Self { entries, levels })
    }

    /// The root hash committing to every entry.
    pub fn root(&self) -> B256 {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of real (non-padding) entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the tree has no entries (never true for a built tree).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of siblings in every proof from this tree.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// The entry at a leaf index.
    pub fn entry(&self, index: usize) -> Option<&CommitmentEntry> {
        self.entries.get(index)
    }

    /// Generate the inclusion proof for a leaf index.
    pub fn prove(&self, index: usize) -> Result<crate::proof::InclusionProof> {
        if index >= self.entries.len() {
            return Err(MerkleError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            });
        }

        let mut siblings = Vec::with_capacity(self.depth());
        let mut position = index;
        for level in &self.levels[..self.levels.len() - 1] {
            siblings.push(level[position ^ 1]);
            position >>= 1;
        }

        Ok(crate::proof::InclusionProof::new(index as u32, siblings))
    }

    /// Answer a species guess for a token with an inclusion proof.
    ///
    /// A guess matches only when both the hashed species name and the
    /// token-specific label agree with a stored leaf. A wrong guess gets the
    /// proof of a deterministically chosen *other* leaf, never the token's
    /// own, so the response shape never reveals whether the guess was right;
    /// correctness is only observable through the external contract's
    /// verification outcome.
    pub fn prove_guess(
        &self,
        token_id: TokenId,
        species_guess: &str,
    ) -> Result<crate::proof::InclusionProof> {
        let value = species_value_hash(species_guess);
        let label = token_species_label(token_id);

        let matched = self
            .entries
            .iter()
            .position(|entry| entry.value == value && entry.label == label);

        let index = match matched {
            Some(index) => index,
            None => {
                let own = self.entries.iter().position(|entry| entry.label == label);
                let mut index = decoy_index(token_id, species_guess, self.entries.len());
                // A wrong guess must not be handed the token's own leaf. A
                // single-entry tree has no other leaf to offer.
                if Some(index) == own && self.entries.len() > 1 {
                    index = (index + 1) % self.entries.len();
                }
                index
            }
        };

        self.prove(index)
    }
}

/// Deterministic decoy leaf index for a wrong guess.
fn decoy_index(token_id: TokenId, species_guess: &str, len: usize) -> usize {
    let mut data = Vec::with_capacity(4 + species_guess.len());
    data.extend_from_slice(&token_id.value().to_be_bytes());
    data.extend_from_slice(species_guess.as_bytes());
    let hash = keccak256(&data);

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash[..8]);
    (u64::from_be_bytes(prefix) % len as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: u32) -> TokenId {
        TokenId::new(id).unwrap()
    }

    fn build_tree() -> CommitmentTree {
        let names = ["Blue Jay", "Robin", "Mallard", "Osprey", "Wood Thrush"];
        let entries = names
            .iter()
            .enumerate()
            .map(|(i, name)| CommitmentEntry {
                value: species_value_hash(name),
                label: token_species_label(token(i as u32)),
            })
            .collect();
        CommitmentTree::from_entries(entries).unwrap()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert!(matches!(
            CommitmentTree::from_entries(Vec::new()),
            Err(MerkleError::EmptyTree)
        ));
    }

    #[test]
    fn test_all_leaves_verify() {
        let tree = build_tree();
        let root = tree.root();

        for index in 0..tree.len() {
            let proof = tree.prove(index).unwrap();
            assert_eq!(proof.siblings.len(), tree.depth());
            assert!(proof.verify(tree.entry(index).unwrap(), root));
        }
    }

    #[test]
    fn test_prove_out_of_bounds() {
        let tree = build_tree();
        assert!(tree.prove(tree.len()).is_err());
    }

    #[test]
    fn test_correct_guess_returns_matching_leaf() {
        let tree = build_tree();
        let proof = tree.prove_guess(token(0), "Blue Jay").unwrap();
        assert_eq!(proof.leaf_index, 0);
        assert!(proof.verify(tree.entry(0).unwrap(), tree.root()));
    }

    #[test]
    fn test_guess_must_match_both_value_and_label() {
        let tree = build_tree();

        // Right species text for the wrong token is still a wrong guess: the
        // returned leaf never carries both the guessed value and the token's
        // label, and never is the token's own leaf.
        let proof = tree.prove_guess(token(1), "Blue Jay").unwrap();
        let pointed = tree.entry(proof.leaf_index as usize).unwrap();
        assert!(
            pointed.value != species_value_hash("Blue Jay")
                || pointed.label != token_species_label(token(1))
        );
        assert_ne!(proof.leaf_index, 1);
    }

    #[test]
    fn test_wrong_guess_is_deterministic_and_structurally_valid() {
        let tree = build_tree();
        let root = tree.root();

        let a = tree.prove_guess(token(0), "Robin").unwrap();
        let b = tree.prove_guess(token(0), "Robin").unwrap();
        assert_eq!(a, b);

        // Same shape as a correct proof, and valid for whatever leaf it
        // points at, just not the guessed one.
        assert_eq!(a.siblings.len(), tree.depth());
        let pointed = tree.entry(a.leaf_index as usize).unwrap();
        assert!(a.verify(pointed, root));
        assert_ne!(pointed.value, species_value_hash("Robin"));

        // Different wrong guesses spread across different decoys.
        let c = tree.prove_guess(token(0), "Osprey Hawk").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_wrong_guess_never_returns_the_tokens_own_leaf() {
        let tree = build_tree();

        // Token 0's committed leaf is index 0; no wrong guess may point
        // there, or the decoy would be indistinguishable from a hit.
        for i in 0..32 {
            let proof = tree.prove_guess(token(0), &format!("guess-{}", i)).unwrap();
            assert_ne!(proof.leaf_index, 0);
        }
    }

    #[test]
    fn test_single_entry_tree() {
        let tree = CommitmentTree::from_entries(vec![CommitmentEntry {
            value: species_value_hash("Blue Jay"),
            label: token_species_label(token(0)),
        }])
        .unwrap();

        assert_eq!(tree.depth(), 0);
        let proof = tree.prove(0).unwrap();
        assert!(proof.verify(tree.entry(0).unwrap(), tree.root()));
    }
}
