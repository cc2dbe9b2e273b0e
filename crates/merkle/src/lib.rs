//! # Lifelist Merkle
//!
//! Per-collection merkle commitment trees, inclusion proofs, and the
//! guess-to-proof lookup used to answer identification attempts.
//!
//! The trees commit to `(keccak256(species_name), "{token_id}-species")`
//! leaves. A correct guess gets its own leaf's proof; a wrong guess gets a
//! deterministic decoy proof with the same shape, so correctness is only
//! observable through the external contract's on-chain verification.

#![warn(missing_docs)]

pub mod error;
pub mod proof;
pub mod store;
pub mod tree;

pub use error::{MerkleError, Result};
pub use proof::InclusionProof;
pub use store::CommitmentStore;
pub use tree::{CommitmentEntry, CommitmentTree};
