//! Database types for the indexer storage layer.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use lifelist_core::types::{SeasonId, SpeciesId, TokenId};
use std::str::FromStr;

/// A point ledger record as stored in the database.
///
/// This represents the best-scoring identification for the canonical key
/// `(address, season, species_id)`. Crediting the same key again only
/// replaces the row when the new amount is strictly greater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointRecord {
    /// The player who made the identification.
    pub address: Address,

    /// The season the identification counts toward.
    pub season: SeasonId,

    /// The identified species.
    pub species_id: SpeciesId,

    /// Points credited for this identification.
    pub amount: i64,

    /// The token whose event earned the credit.
    pub token_id: TokenId,

    /// Event timestamp (unix seconds).
    pub timestamp_u64: u64,
}

/// A daily streak row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakRow {
    /// The player the streak belongs to.
    pub address: Address,

    /// Date of the most recent counted login (UTC).
    pub last_login_date: chrono::NaiveDate,

    /// Consecutive-day count including the last login.
    pub current_streak: u32,

    /// Longest run ever achieved.
    pub longest_streak: u32,

    /// Lifetime milestone bonus total.
    pub bonus_points_earned: u64,
}

/// Canonical database encoding for an address: lowercase 0x-prefixed hex.
pub fn address_to_db(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Parse an address from its database encoding.
pub fn address_from_db(text: &str) -> Result<Address> {
    Address::from_str(text).with_context(|| format!("Invalid address in database: {}", text))
}
