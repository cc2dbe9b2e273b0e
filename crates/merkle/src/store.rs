//! Commitment store: one tree per collection, loaded once at startup.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use lifelist_core::constants::COLLECTION_COUNT;
use lifelist_core::types::{CollectionId, TokenId};

use crate::proof::InclusionProof;
use crate::tree::{CommitmentEntry, CommitmentTree};

/// Read-only set of commitment trees, keyed by collection.
///
/// Commitment artifacts are immutable after load; collections without a
/// published artifact are simply absent.
#[derive(Debug, Clone, Default)]
pub struct CommitmentStore {
    trees: HashMap<u8, CommitmentTree>,
}

impl CommitmentStore {
    /// Load commitment files from a directory of `collection-{n}.json` files,
    /// each holding a JSON array of `{value, label}` entries.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut trees = HashMap::new();

        for collection in 0..COLLECTION_COUNT {
            let path = dir.join(format!("collection-{}.json", collection));
            if !path.exists() {
                continue;
            }

            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read commitment file: {}", path.display()))?;
            let entries: Vec<CommitmentEntry> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse commitment file: {}", path.display()))?;

            let tree = CommitmentTree::from_entries(entries).with_context(|| {
                format!("Failed to build commitment tree from {}", path.display())
            })?;

            trees.insert(collection as u8, tree);
        }

        Ok(Self { trees })
    }

    /// Build a store from explicit (collection, tree) pairs.
    pub fn from_trees(trees: impl IntoIterator<Item = (CollectionId, CommitmentTree)>) -> Self {
        Self {
            trees: trees
                .into_iter()
                .map(|(collection, tree)| (collection.value(), tree))
                .collect(),
        }
    }

    /// The tree for a collection, if its artifact was loaded.
    pub fn tree(&self, collection: CollectionId) -> Option<&CommitmentTree> {
        self.trees.get(&collection.value())
    }

    /// Answer a species guess for a token using that token's collection tree.
    ///
    /// Returns `None` when the token's collection has no commitment artifact.
    pub fn prove_guess(
        &self,
        token_id: TokenId,
        species_guess: &str,
    ) -> Option<crate::error::Result<InclusionProof>> {
        self.tree(token_id.collection())
            .map(|tree| tree.prove_guess(token_id, species_guess))
    }

    /// Number of loaded collection trees.
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    /// Whether no trees were loaded.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
