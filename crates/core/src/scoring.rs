//! Point accounting engine.
//!
//! A pure mapping from a canonical event to a point amount and species id.
//! No I/O; fully deterministic given its inputs.

use crate::constants::{
    POINTS_FIRST_IDENTIFICATION, POINTS_PREMIUM_SALE, POINTS_TRANSFER, REFERENCE_MINT_PRICE_WEI,
};
use crate::error::{CoreError, Result};
use crate::registry::SpeciesRegistry;
use crate::types::{CanonicalEvent, EventKind, SpeciesId};

/// Result of scoring one canonical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    /// Points awarded for this event.
    pub points: u32,
    /// Species the points are attributed to.
    pub species_id: SpeciesId,
}

/// Score a canonical event.
///
/// Rule order is significant and must not be rearranged:
/// 1. Token without a species mapping fails with `MissingSpecies`.
/// 2. Mint (zero `from` address) earns the first-identification award.
/// 3. Sale above the reference mint price earns the premium-sale award.
/// 4. Everything else (ordinary transfer, at-or-below-mint sale) earns one
///    point.
pub fn score(event: &CanonicalEvent, registry: &SpeciesRegistry) -> Result<ScoreOutcome> {
    let species = registry
        .species_for_token(event.token_id)
        .ok_or(CoreError::MissingSpecies(event.token_id.value()))?;

    let points = if event.from.is_zero() {
        POINTS_FIRST_IDENTIFICATION
    } else if matches!(event.kind, EventKind::Sale { price_paid } if price_paid > REFERENCE_MINT_PRICE_WEI)
    {
        POINTS_PREMIUM_SALE
    } else {
        POINTS_TRANSFER
    };

    Ok(ScoreOutcome {
        points,
        species_id: species.species_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Species, TokenId};
    use alloy_primitives::{Address, U256};
    use chrono::Utc;

    fn registry() -> SpeciesRegistry {
        SpeciesRegistry::from_entries([(
            TokenId::new(42).unwrap(),
            Species {
                species_id: SpeciesId(7),
                name: "Blue Jay".to_string(),
                family: "Corvidae".to_string(),
            },
        )])
    }

    fn event(from: Address, kind: EventKind) -> CanonicalEvent {
        CanonicalEvent {
            token_id: TokenId::new(42).unwrap(),
            from,
            to: Address::repeat_byte(0x02),
            kind,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_mint_scores_first_identification() {
        let outcome = score(&event(Address::ZERO, EventKind::Transfer), &registry()).unwrap();
        assert_eq!(outcome.points, 10);
        assert_eq!(outcome.species_id, SpeciesId(7));
    }

    #[test]
    fn test_premium_sale_scores_three() {
        let outcome = score(
            &event(
                Address::repeat_byte(0x01),
                EventKind::Sale {
                    price_paid: U256::from(1_500_000_000_000_001u64),
                },
            ),
            &registry(),
        )
        .unwrap();
        assert_eq!(outcome.points, 3);
    }

    #[test]
    fn test_at_or_below_mint_sale_scores_one() {
        for price in [1_500_000_000_000_000u64, 1u64] {
            let outcome = score(
                &event(
                    Address::repeat_byte(0x01),
                    EventKind::Sale {
                        price_paid: U256::from(price),
                    },
                ),
                &registry(),
            )
            .unwrap();
            assert_eq!(outcome.points, 1);
        }
    }

    #[test]
    fn test_plain_transfer_scores_one() {
        let outcome = score(
            &event(Address::repeat_byte(0x01), EventKind::Transfer),
            &registry(),
        )
        .unwrap();
        assert_eq!(outcome.points, 1);
    }

    #[test]
    fn test_mint_rule_takes_precedence_over_sale() {
        // A mint that somehow carries a premium price still scores as a mint.
        let outcome = score(
            &event(
                Address::ZERO,
                EventKind::Sale {
                    price_paid: U256::from(9_000_000_000_000_000u64),
                },
            ),
            &registry(),
        )
        .unwrap();
        assert_eq!(outcome.points, 10);
    }

    #[test]
    fn test_missing_species_is_an_error_not_zero() {
        let mut event = event(Address::ZERO, EventKind::Transfer);
        event.token_id = TokenId::new(43).unwrap();
        let err = score(&event, &registry()).unwrap_err();
        assert!(matches!(err, CoreError::MissingSpecies(43)));
    }
}
