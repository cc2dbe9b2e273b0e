//! Error types for the core crate.

use thiserror::Error;

/// Core error type.
///
/// Validation failures are surfaced to the caller without retry.
/// `MissingSpecies` is a data-integrity failure: the event that hit it must
/// fail loudly, never degrade into a silent zero-point award.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Token id outside the supported range.
    #[error("Invalid token id: {0} (must be between 0 and 9999)")]
    InvalidTokenId(u64),

    /// Collection number outside the supported range.
    #[error("Invalid collection id: {0} (must be between 0 and 9)")]
    InvalidCollectionId(u64),

    /// Season identifier not in the canonical season list.
    #[error("Unknown season: {0}")]
    UnknownSeason(String),

    /// A token has no species mapping in the registry.
    #[error("No species mapping for token {0}")]
    MissingSpecies(u32),
}

/// Result type alias for CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;
