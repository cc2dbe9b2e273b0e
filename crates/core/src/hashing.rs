//! Hashing utilities for the Lifelist backend.
//!
//! Provides keccak256 hashing plus the leaf value / label conventions used by
//! the merkle commitment trees and the on-chain verifier.

use alloy_primitives::{keccak256 as alloy_keccak256, B256};

use crate::constants::{INTERNAL_PREFIX, LEAF_PREFIX};
use crate::types::TokenId;

/// Compute keccak256 hash of input data.
///
/// This is a re-export of Alloy's keccak256 for convenience.
pub fn keccak256(data: &[u8]) -> B256 {
    alloy_keccak256(data)
}

/// Hash a species name into the 32-byte value committed in a tree leaf.
///
/// Both the commitment entries and the guess lookup use this, so a guess
/// matches exactly when its hash equals the stored leaf value.
pub fn species_value_hash(species_name: &str) -> B256 {
    keccak256(species_name.as_bytes())
}

/// The leaf label binding a species entry to one token.
///
/// The label is part of the leaf preimage, so a proof for the right species
/// text but the wrong token cannot validate (no cross-token proof reuse).
pub fn token_species_label(token_id: TokenId) -> String {
    format!("{}-species", token_id)
}

/// Compute the leaf hash for a commitment entry.
///
/// The leaf hash is: `keccak256(0x00 || value || label)`.
pub fn compute_leaf_hash(value: &B256, label: &str) -> B256 {
    let mut data = Vec::with_capacity(33 + label.len());
    data.push(LEAF_PREFIX);
    data.extend_from_slice(value.as_slice());
    data.extend_from_slice(label.as_bytes());

    keccak256(&data)
}

/// Compute the internal node hash for a commitment tree node.
///
/// The internal hash is: `keccak256(0x01 || left || right)`.
///
/// Note: This is positional (no lexicographic sorting).
pub fn compute_internal_hash(left: &B256, right: &B256) -> B256 {
    let mut data = Vec::with_capacity(65);
    data.push(INTERNAL_PREFIX);
    data.extend_from_slice(left.as_slice());
    data.extend_from_slice(right.as_slice());

    keccak256(&data)
}
