//! Point ledger operations.

use super::{address_from_db, address_to_db, PointRecord, Storage};
use anyhow::{Context, Result};
use lifelist_core::types::{SeasonId, SpeciesId, TokenId};
use sqlx::Row;
use std::str::FromStr;

impl Storage {
    /// Credit an identification into the ledger with best-score-wins semantics.
    ///
    /// The canonical key is `(address, season, species_id)`. A fresh key is
    /// inserted; an existing key is replaced only when the new amount is
    /// strictly greater. Equal or lower amounts leave the row untouched, so
    /// replaying the same event stream in any order converges on the same
    /// ledger.
    ///
    /// Returns `true` if inserted/updated, `false` if stale.
    pub async fn credit_points(&self, record: &PointRecord) -> Result<bool> {
        let address = address_to_db(&record.address);

        let result = sqlx::query(
            r#"
            INSERT INTO points (address, season, species_id, amount, token_id, timestamp_u64)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(address, season, species_id)
            DO UPDATE SET
                amount = excluded.amount,
                token_id = excluded.token_id,
                timestamp_u64 = excluded.timestamp_u64
            WHERE excluded.amount > points.amount
            "#,
        )
        .bind(&address)
        .bind(record.season.as_str())
        .bind(record.species_id.0 as i64)
        .bind(record.amount)
        .bind(record.token_id.value() as i64)
        .bind(record.timestamp_u64 as i64)
        .execute(&self.pool)
        .await
        .context("Failed to credit points")?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch the ledger row for one (address, season, species) key.
    pub async fn get_point_record(
        &self,
        address: &alloy_primitives::Address,
        season: SeasonId,
        species_id: SpeciesId,
    ) -> Result<Option<PointRecord>> {
        let row = sqlx::query(
            r#"
            SELECT address, season, species_id, amount, token_id, timestamp_u64
            FROM points
            WHERE address = ? AND season = ? AND species_id = ?
            "#,
        )
        .bind(address_to_db(address))
        .bind(season.as_str())
        .bind(species_id.0 as i64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch point record")?;

        row.map(row_to_record).transpose()
    }

    /// Total points a player holds in one season.
    pub async fn get_season_total(
        &self,
        address: &alloy_primitives::Address,
        season: SeasonId,
    ) -> Result<i64> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT SUM(amount)
            FROM points
            WHERE address = ? AND season = ?
            "#,
        )
        .bind(address_to_db(address))
        .bind(season.as_str())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum season points")?;

        Ok(total.unwrap_or(0))
    }

    /// A player's life list: every species they have ever identified,
    /// deduplicated across all seasons, ascending by species id.
    pub async fn get_life_list(
        &self,
        address: &alloy_primitives::Address,
    ) -> Result<Vec<SpeciesId>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT species_id
            FROM points
            WHERE address = ?
            ORDER BY species_id ASC
            "#,
        )
        .bind(address_to_db(address))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch life list")?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("species_id")?;
                Ok(SpeciesId(id as u32))
            })
            .collect()
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<PointRecord> {
    let address: String = row.try_get("address")?;
    let season: String = row.try_get("season")?;
    let species_id: i64 = row.try_get("species_id")?;
    let amount: i64 = row.try_get("amount")?;
    let token_id: i64 = row.try_get("token_id")?;
    let timestamp_u64: i64 = row.try_get("timestamp_u64")?;

    Ok(PointRecord {
        address: address_from_db(&address)?,
        season: SeasonId::from_str(&season)
            .with_context(|| format!("Invalid season in database: {}", season))?,
        species_id: SpeciesId(species_id as u32),
        amount,
        token_id: TokenId::new(token_id as u32)
            .with_context(|| format!("Invalid token id in database: {}", token_id))?,
        timestamp_u64: timestamp_u64 as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use tempfile::NamedTempFile;

    async fn test_storage() -> (Storage, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        (storage, temp_db)
    }

    fn record(amount: i64, token: u32, timestamp: u64) -> PointRecord {
        PointRecord {
            address: Address::repeat_byte(0x11),
            season: SeasonId::Season3,
            species_id: SpeciesId(42),
            amount,
            token_id: TokenId::new(token).unwrap(),
            timestamp_u64: timestamp,
        }
    }

    #[tokio::test]
    async fn test_credit_insert_and_fetch() {
        let (storage, _temp) = test_storage().await;

        let rec = record(10, 3042, 1_700_000_000);
        assert!(storage.credit_points(&rec).await.unwrap());

        let fetched = storage
            .get_point_record(&rec.address, rec.season, rec.species_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched, rec);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_credit_is_idempotent() {
        let (storage, _temp) = test_storage().await;

        let rec = record(3, 3042, 1_700_000_000);
        assert!(storage.credit_points(&rec).await.unwrap());

        // Replaying the identical event is stale and changes nothing.
        assert!(!storage.credit_points(&rec).await.unwrap());

        let fetched = storage
            .get_point_record(&rec.address, rec.season, rec.species_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.amount, 3);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_credit_is_monotonic() {
        let (storage, _temp) = test_storage().await;

        assert!(storage
            .credit_points(&record(10, 3042, 1_700_000_000))
            .await
            .unwrap());

        // A lower-value event for the same species never lowers the score,
        // regardless of timestamps.
        assert!(!storage
            .credit_points(&record(1, 3050, 1_700_009_999))
            .await
            .unwrap());

        let addr = Address::repeat_byte(0x11);
        let fetched = storage
            .get_point_record(&addr, SeasonId::Season3, SpeciesId(42))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.amount, 10);
        assert_eq!(fetched.token_id.value(), 3042);

        // Ties are stale too; only a strictly greater amount replaces the row.
        assert!(!storage
            .credit_points(&record(10, 3050, 1_700_009_999))
            .await
            .unwrap());

        storage.close().await;
    }

    #[tokio::test]
    async fn test_credit_is_commutative() {
        let (storage_a, _temp_a) = test_storage().await;
        let (storage_b, _temp_b) = test_storage().await;

        let low = record(1, 3042, 1_700_000_000);
        let high = record(10, 3050, 1_700_000_500);

        storage_a.credit_points(&low).await.unwrap();
        storage_a.credit_points(&high).await.unwrap();

        storage_b.credit_points(&high).await.unwrap();
        storage_b.credit_points(&low).await.unwrap();

        let addr = Address::repeat_byte(0x11);
        let a = storage_a
            .get_point_record(&addr, SeasonId::Season3, SpeciesId(42))
            .await
            .unwrap();
        let b = storage_b
            .get_point_record(&addr, SeasonId::Season3, SpeciesId(42))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.unwrap().amount, 10);

        storage_a.close().await;
        storage_b.close().await;
    }

    #[tokio::test]
    async fn test_seasons_are_independent_ledgers() {
        let (storage, _temp) = test_storage().await;

        let mut season_4 = record(10, 3042, 1_700_000_000);
        season_4.season = SeasonId::Season4;

        storage.credit_points(&record(3, 3042, 1_600_000_000)).await.unwrap();
        storage.credit_points(&season_4).await.unwrap();

        let addr = Address::repeat_byte(0x11);
        assert_eq!(
            storage.get_season_total(&addr, SeasonId::Season3).await.unwrap(),
            3
        );
        assert_eq!(
            storage.get_season_total(&addr, SeasonId::Season4).await.unwrap(),
            10
        );

        // The life list deduplicates across seasons.
        assert_eq!(storage.get_life_list(&addr).await.unwrap(), vec![SpeciesId(42)]);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_life_list_orders_by_species() {
        let (storage, _temp) = test_storage().await;

        for (species, token) in [(77u32, 100u32), (5, 200), (42, 300)] {
            let mut rec = record(10, token, 1_700_000_000);
            rec.species_id = SpeciesId(species);
            storage.credit_points(&rec).await.unwrap();
        }

        let addr = Address::repeat_byte(0x11);
        assert_eq!(
            storage.get_life_list(&addr).await.unwrap(),
            vec![SpeciesId(5), SpeciesId(42), SpeciesId(77)]
        );

        storage.close().await;
    }
}
