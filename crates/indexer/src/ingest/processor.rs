//! Event processing: normalize, gate on the season window, score, credit.
//!
//! Both adapters funnel raw events through one [`EventProcessor`], so replay
//! and live delivery produce identical ledger writes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lifelist_core::registry::SpeciesRegistry;
use lifelist_core::scoring;
use lifelist_core::types::{CanonicalEvent, SeasonId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SeasonConfig;
use crate::ingest::event::RawAssetEvent;
use crate::storage::{PointRecord, Storage};

/// What happened when one event was applied to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The ledger row was inserted or improved.
    Credited,
    /// The ledger already held an equal or better score for the key.
    Stale,
    /// The event fell outside the active season window.
    OutsideWindow,
    /// The event does not qualify for scoring (bundle, burn, non-ETH sale).
    Skipped,
}

/// Summary of one batch of raw events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Events that inserted or improved a ledger row.
    pub credited: u64,
    /// Events the ledger already covered at an equal or better score.
    pub stale: u64,
    /// Events skipped before scoring (window, bundles, burns).
    pub skipped: u64,
    /// Descriptions of events that failed to normalize or score.
    pub failed: Vec<String>,
}

/// Applies canonical events to the point ledger for the active season.
#[derive(Debug, Clone)]
pub struct EventProcessor {
    storage: Storage,
    registry: Arc<SpeciesRegistry>,
    season: SeasonId,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
}

impl EventProcessor {
    /// Create a processor crediting into the configured season.
    pub fn new(storage: Storage, registry: Arc<SpeciesRegistry>, season: &SeasonConfig) -> Self {
        Self {
            storage,
            registry,
            season: season.active,
            window_start: season.starts_at,
            window_end: season.ends_at,
        }
    }

    /// The season this processor credits into.
    pub fn season(&self) -> SeasonId {
        self.season
    }

    /// Apply one canonical event to the ledger.
    pub async fn apply(&self, event: &CanonicalEvent) -> Result<ApplyOutcome> {
        // Window check comes first so past-season replays are cheap no-ops.
        if event.timestamp < self.window_start || event.timestamp >= self.window_end {
            debug!(
                token_id = event.token_id.value(),
                timestamp = %event.timestamp,
                "Event outside active season window"
            );
            return Ok(ApplyOutcome::OutsideWindow);
        }

        // Burns earn nothing.
        if event.to.is_zero() {
            return Ok(ApplyOutcome::Skipped);
        }

        let outcome = scoring::score(event, &self.registry)
            .with_context(|| format!("Failed to score event for token {}", event.token_id))?;

        let record = PointRecord {
            address: event.to,
            season: self.season,
            species_id: outcome.species_id,
            amount: outcome.points as i64,
            token_id: event.token_id,
            timestamp_u64: event.timestamp.timestamp() as u64,
        };

        let credited = self.storage.credit_points(&record).await?;
        if credited {
            debug!(
                address = %event.to,
                species_id = outcome.species_id.0,
                points = outcome.points,
                "Credited identification"
            );
            Ok(ApplyOutcome::Credited)
        } else {
            Ok(ApplyOutcome::Stale)
        }
    }

    /// Normalize and apply one raw marketplace event.
    pub async fn apply_raw(&self, raw: &RawAssetEvent) -> Result<ApplyOutcome> {
        match raw.normalize()? {
            Some(event) => self.apply(&event).await,
            None => Ok(ApplyOutcome::Skipped),
        }
    }

    /// Apply a batch of raw events, continuing past per-event failures.
    ///
    /// A malformed event is logged and counted but never aborts the batch;
    /// the ledger's idempotence makes a later replay of the same page safe.
    pub async fn apply_batch(&self, batch: &[RawAssetEvent]) -> Result<BatchSummary> {
        let mut summary = BatchSummary::default();

        for raw in batch {
            match self.apply_raw(raw).await {
                Ok(ApplyOutcome::Credited) => summary.credited += 1,
                Ok(ApplyOutcome::Stale) => summary.stale += 1,
                Ok(ApplyOutcome::OutsideWindow) | Ok(ApplyOutcome::Skipped) => {
                    summary.skipped += 1
                }
                Err(e) => {
                    warn!("Failed to process event: {:#}", e);
                    summary.failed.push(format!("{:#}", e));
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use lifelist_core::types::{EventKind, Species, SpeciesId, TokenId};
    use tempfile::NamedTempFile;

    fn test_registry() -> Arc<SpeciesRegistry> {
        Arc::new(SpeciesRegistry::from_entries([(
            TokenId::new(3042).unwrap(),
            Species {
                species_id: SpeciesId(42),
                name: "Wood Thrush".to_string(),
                family: "Turdidae".to_string(),
            },
        )]))
    }

    fn season_config() -> SeasonConfig {
        SeasonConfig {
            active: SeasonId::Season3,
            starts_at: "2026-01-01T00:00:00Z".parse().unwrap(),
            ends_at: "2026-07-01T00:00:00Z".parse().unwrap(),
        }
    }

    async fn test_processor() -> (EventProcessor, Storage, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        let processor = EventProcessor::new(storage.clone(), test_registry(), &season_config());
        (processor, storage, temp_db)
    }

    fn mint_event(timestamp: &str) -> CanonicalEvent {
        CanonicalEvent {
            token_id: TokenId::new(3042).unwrap(),
            from: Address::ZERO,
            to: Address::repeat_byte(0x33),
            kind: EventKind::Transfer,
            timestamp: timestamp.parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_mint_credits_first_identification() {
        let (processor, storage, _temp) = test_processor().await;

        let outcome = processor
            .apply(&mint_event("2026-02-01T12:00:00Z"))
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Credited);

        let record = storage
            .get_point_record(&Address::repeat_byte(0x33), SeasonId::Season3, SpeciesId(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.amount, 10);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_replay_is_stale() {
        let (processor, storage, _temp) = test_processor().await;

        let event = mint_event("2026-02-01T12:00:00Z");
        assert_eq!(processor.apply(&event).await.unwrap(), ApplyOutcome::Credited);
        assert_eq!(processor.apply(&event).await.unwrap(), ApplyOutcome::Stale);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_window_is_enforced() {
        let (processor, storage, _temp) = test_processor().await;

        // Before the window, and exactly at the exclusive end.
        assert_eq!(
            processor
                .apply(&mint_event("2025-12-31T23:59:59Z"))
                .await
                .unwrap(),
            ApplyOutcome::OutsideWindow
        );
        assert_eq!(
            processor
                .apply(&mint_event("2026-07-01T00:00:00Z"))
                .await
                .unwrap(),
            ApplyOutcome::OutsideWindow
        );

        storage.close().await;
    }

    #[tokio::test]
    async fn test_burn_is_skipped() {
        let (processor, storage, _temp) = test_processor().await;

        let mut event = mint_event("2026-02-01T12:00:00Z");
        event.from = Address::repeat_byte(0x33);
        event.to = Address::ZERO;
        assert_eq!(processor.apply(&event).await.unwrap(), ApplyOutcome::Skipped);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_premium_sale_does_not_displace_mint() {
        let (processor, storage, _temp) = test_processor().await;

        processor
            .apply(&mint_event("2026-02-01T12:00:00Z"))
            .await
            .unwrap();

        // Later premium sale for the same species scores 3, which loses to 10.
        let sale = CanonicalEvent {
            token_id: TokenId::new(3042).unwrap(),
            from: Address::repeat_byte(0x44),
            to: Address::repeat_byte(0x33),
            kind: EventKind::Sale {
                price_paid: U256::from(2_000_000_000_000_000u64),
            },
            timestamp: "2026-03-01T12:00:00Z".parse().unwrap(),
        };
        assert_eq!(processor.apply(&sale).await.unwrap(), ApplyOutcome::Stale);

        let record = storage
            .get_point_record(&Address::repeat_byte(0x33), SeasonId::Season3, SpeciesId(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.amount, 10);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let (processor, storage, _temp) = test_processor().await;

        let good: RawAssetEvent = serde_json::from_value(serde_json::json!({
            "event_type": "transfer",
            "nft": { "identifier": "3042" },
            "from_address": "0x0000000000000000000000000000000000000000",
            "to_address": "0x3333333333333333333333333333333333333333",
            "event_timestamp": 1_770_000_000
        }))
        .unwrap();
        let malformed: RawAssetEvent = serde_json::from_value(serde_json::json!({
            "event_type": "transfer",
            "nft": { "identifier": "not-a-number" },
            "from_address": "0x0000000000000000000000000000000000000000",
            "to_address": "0x3333333333333333333333333333333333333333",
            "event_timestamp": 1_770_000_000
        }))
        .unwrap();

        let summary = processor
            .apply_batch(&[malformed, good])
            .await
            .unwrap();
        assert_eq!(summary.credited, 1);
        assert_eq!(summary.failed.len(), 1);

        storage.close().await;
    }
}
