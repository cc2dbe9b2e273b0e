//! Species registry: token id to species mapping, loaded once at startup.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::constants::{COLLECTION_COUNT, COLLECTION_SIZE};
use crate::types::{CollectionId, Species, SpeciesId, TokenId};

/// One entry in a per-collection registry file.
///
/// The position of an entry within its file determines the token id:
/// `collection * 1000 + index`.
#[derive(Debug, Clone, Deserialize)]
struct RegistryFileEntry {
    species_id: u32,
    name: String,
    family: String,
}

/// Read-only token-to-species mapping.
///
/// Loaded once at startup and never mutated; species assignment is fixed at
/// reveal time, so a missing mapping during scoring is a data-integrity
/// failure rather than a transient condition.
#[derive(Debug, Clone, Default)]
pub struct SpeciesRegistry {
    by_token: HashMap<u32, Species>,
}

impl SpeciesRegistry {
    /// Load the registry from a directory of `collection-{n}.json` files.
    ///
    /// Each file holds an ordered JSON array of `{species_id, name, family}`
    /// entries, one per token in that collection.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut by_token = HashMap::new();

        for collection in 0..COLLECTION_COUNT {
            let path = dir.join(format!("collection-{}.json", collection));
            if !path.exists() {
                // Collections are revealed one at a time; later files may not
                // exist yet.
                continue;
            }

            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
            let entries: Vec<RegistryFileEntry> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse registry file: {}", path.display()))?;

            anyhow::ensure!(
                entries.len() <= COLLECTION_SIZE as usize,
                "Registry file {} has {} entries (max {})",
                path.display(),
                entries.len(),
                COLLECTION_SIZE
            );

            for (index, entry) in entries.into_iter().enumerate() {
                let token_id = collection * COLLECTION_SIZE + index as u32;
                by_token.insert(
                    token_id,
                    Species {
                        species_id: SpeciesId(entry.species_id),
                        name: entry.name,
                        family: entry.family,
                    },
                );
            }
        }

        Ok(Self { by_token })
    }

    /// Build a registry from explicit (token id, species) pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (TokenId, Species)>) -> Self {
        let by_token = entries
            .into_iter()
            .map(|(token, species)| (token.value(), species))
            .collect();
        Self { by_token }
    }

    /// Look up the species assigned to a token.
    pub fn species_for_token(&self, token_id: TokenId) -> Option<&Species> {
        self.by_token.get(&token_id.value())
    }

    /// Whether any token of the given collection is present.
    pub fn has_collection(&self, collection: CollectionId) -> bool {
        let first = collection.first_token();
        (first..first + COLLECTION_SIZE).any(|id| self.by_token.contains_key(&id))
    }

    /// Number of tokens with a species mapping.
    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    /// Whether the registry has no mappings.
    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}
