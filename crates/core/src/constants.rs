//! Canonical constants for the Lifelist backend.

use alloy_primitives::U256;

/// Number of tokens in each collection (flock).
pub const COLLECTION_SIZE: u32 = 1000;

/// Number of collections in the game.
pub const COLLECTION_COUNT: u32 = 10;

/// Lowest valid token id.
pub const MIN_TOKEN_ID: u32 = 0;

/// Highest valid token id.
pub const MAX_TOKEN_ID: u32 = COLLECTION_SIZE * COLLECTION_COUNT - 1;

/// Reference mint price in wei (0.0015 ETH).
///
/// A sale above this amount earns premium-sale points; a sale at or below it
/// earns ordinary transfer points.
pub const REFERENCE_MINT_PRICE_WEI: U256 = U256::from_limbs([1_500_000_000_000_000u64, 0, 0, 0]);

/// Points for a first identification (mint from the zero address).
pub const POINTS_FIRST_IDENTIFICATION: u32 = 10;

/// Points for a sale above the reference mint price.
pub const POINTS_PREMIUM_SALE: u32 = 3;

/// Points for an ordinary transfer or at-or-below-mint sale.
pub const POINTS_TRANSFER: u32 = 1;

/// Daily streak milestones as (streak length, bonus points).
///
/// A bonus fires only on the transition that reaches the milestone exactly,
/// never on a same-day repeat.
pub const STREAK_MILESTONES: [(u32, u64); 3] = [(7, 50), (14, 125), (30, 300)];

/// Placeholder species name for tokens not yet identified on-chain.
pub const UNIDENTIFIED_NAME: &str = "UNIDENTIFIED";

/// Domain prefix for commitment tree leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;

/// Domain prefix for commitment tree internal node hashes.
pub const INTERNAL_PREFIX: u8 = 0x01;

/// Bonus points for reaching a given streak length, if it is a milestone.
pub fn streak_milestone_bonus(streak: u32) -> u64 {
    STREAK_MILESTONES
        .iter()
        .find_map(|(at, bonus)| (*at == streak).then_some(*bonus))
        .unwrap_or(0)
}
