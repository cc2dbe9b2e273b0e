//! Core types for the Lifelist backend.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{COLLECTION_COUNT, COLLECTION_SIZE, MAX_TOKEN_ID};
use crate::error::CoreError;

/// Token identifier in the range 0..=9999.
///
/// Validation is enforced during both construction and deserialization so an
/// out-of-range id never enters the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId(u32);

impl TokenId {
    /// Create a new TokenId, validating the range.
    pub fn new(value: u32) -> Result<Self, CoreError> {
        if value > MAX_TOKEN_ID {
            return Err(CoreError::InvalidTokenId(value as u64));
        }
        Ok(TokenId(value))
    }

    /// Get the raw value.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The collection (flock) this token belongs to.
    pub const fn collection(&self) -> CollectionId {
        CollectionId((self.0 / COLLECTION_SIZE) as u8)
    }

    /// Index of this token within its collection.
    pub const fn index_in_collection(&self) -> u32 {
        self.0 % COLLECTION_SIZE
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for TokenId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u32::deserialize(deserializer)?;
        TokenId::new(value).map_err(serde::de::Error::custom)
    }
}

/// Collection (flock) number in the range 0..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(u8);

impl CollectionId {
    /// Create a new CollectionId, validating the range.
    pub fn new(value: u8) -> Result<Self, CoreError> {
        if value as u32 >= COLLECTION_COUNT {
            return Err(CoreError::InvalidCollectionId(value as u64));
        }
        Ok(CollectionId(value))
    }

    /// Get the raw value.
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// First token id in this collection.
    pub const fn first_token(&self) -> u32 {
        self.0 as u32 * COLLECTION_SIZE
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical species identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(pub u32);

impl SpeciesId {
    /// Get the raw value.
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A species entry from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    /// Canonical species id.
    pub species_id: SpeciesId,
    /// Species name.
    pub name: String,
    /// Taxonomic family.
    pub family: String,
}

/// Ordered, closed set of seasons.
///
/// Every ledger partition is keyed by one of these; unknown season strings
/// are rejected at the boundary instead of silently defaulting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SeasonId {
    /// First season.
    Season1,
    /// Second season.
    Season2,
    /// Third season.
    Season3,
    /// Fourth season.
    Season4,
    /// Fifth season.
    Season5,
}

impl SeasonId {
    /// All seasons in canonical order.
    pub const ALL: [SeasonId; 5] = [
        SeasonId::Season1,
        SeasonId::Season2,
        SeasonId::Season3,
        SeasonId::Season4,
        SeasonId::Season5,
    ];

    /// Database / wire string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            SeasonId::Season1 => "season-1",
            SeasonId::Season2 => "season-2",
            SeasonId::Season3 => "season-3",
            SeasonId::Season4 => "season-4",
            SeasonId::Season5 => "season-5",
        }
    }
}

impl fmt::Display for SeasonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeasonId::ALL
            .iter()
            .copied()
            .find(|season| season.as_str() == s)
            .ok_or_else(|| CoreError::UnknownSeason(s.to_string()))
    }
}

impl Serialize for SeasonId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SeasonId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kind of a normalized provider event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Plain ownership transfer (including mints from the zero address).
    Transfer,
    /// Sale with the total native price paid, in wei.
    Sale {
        /// Total price paid, in wei.
        price_paid: U256,
    },
}

/// Canonical event shape produced by both ingestion adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalEvent {
    /// Token the event is about.
    pub token_id: TokenId,
    /// Sender (zero address for mints).
    pub from: Address,
    /// Receiver; points are credited to this address.
    pub to: Address,
    /// Transfer or sale.
    pub kind: EventKind,
    /// Event timestamp from the provider.
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_id_range() {
        assert!(TokenId::new(0).is_ok());
        assert!(TokenId::new(9999).is_ok());
        assert!(TokenId::new(10000).is_err());
    }

    #[test]
    fn test_token_collection() {
        assert_eq!(TokenId::new(0).unwrap().collection().value(), 0);
        assert_eq!(TokenId::new(999).unwrap().collection().value(), 0);
        assert_eq!(TokenId::new(1000).unwrap().collection().value(), 1);
        assert_eq!(TokenId::new(9999).unwrap().collection().value(), 9);
        assert_eq!(TokenId::new(2042).unwrap().index_in_collection(), 42);
    }

    #[test]
    fn test_season_str_conversion() {
        assert_eq!(SeasonId::Season1.as_str(), "season-1");
        assert_eq!("season-5".parse::<SeasonId>().unwrap(), SeasonId::Season5);
        assert!("season-6".parse::<SeasonId>().is_err());
        assert!("5".parse::<SeasonId>().is_err());
        assert!("".parse::<SeasonId>().is_err());
    }

    #[test]
    fn test_season_ordering() {
        assert!(SeasonId::Season1 < SeasonId::Season2);
        let mut sorted = SeasonId::ALL;
        sorted.sort();
        assert_eq!(sorted, SeasonId::ALL);
    }

    #[test]
    fn test_token_id_deserialize_rejects_out_of_range() {
        let ok: TokenId = serde_json::from_str("42").unwrap();
        assert_eq!(ok.value(), 42);
        assert!(serde_json::from_str::<TokenId>("10000").is_err());
    }
}
