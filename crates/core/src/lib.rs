//! # Lifelist Core
//!
//! Core types, constants, hashing utilities, the species registry, the pure
//! point-scoring engine, and the daily streak state machine for the Lifelist
//! collectible-identification backend.
//!
//! This crate provides the fundamental building blocks used across all
//! Lifelist components. Everything here is pure or read-only after load;
//! persistence and I/O live in the indexer and api crates.

#![warn(missing_docs)]

pub mod constants;
pub mod error;
pub mod hashing;
pub mod registry;
pub mod scoring;
pub mod streak;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use error::{CoreError, Result};
pub use hashing::{keccak256, species_value_hash, token_species_label};
pub use registry::SpeciesRegistry;
pub use scoring::{score, ScoreOutcome};
pub use types::*;

// Re-export Alloy primitives for convenience
pub use alloy_primitives::{Address, B256, U256};
