//! Daily streak persistence.
//!
//! The streak transition rules live in `lifelist_core::streak`; this module
//! only loads the stored row, runs the pure transition, and writes back the
//! result.

use super::{address_from_db, address_to_db, Storage, StreakRow};
use alloy_primitives::Address;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use lifelist_core::streak::{self, StreakOutcome, StreakRecord};
use sqlx::Row;

impl Storage {
    /// Fetch a player's streak row, if they have logged in before.
    pub async fn get_streak(&self, address: &Address) -> Result<Option<StreakRow>> {
        let row = sqlx::query(
            r#"
            SELECT address, last_login_date, current_streak, longest_streak, bonus_points_earned
            FROM daily_streaks
            WHERE address = ?
            "#,
        )
        .bind(address_to_db(address))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch streak")?;

        row.map(row_to_streak).transpose()
    }

    /// Register a login for `today` and persist the resulting streak state.
    ///
    /// Applies the transition from `lifelist_core::streak::advance`: first
    /// login creates the row, a consecutive-day login increments (and may pay
    /// a milestone bonus), a same-day login is a no-op, and a gap resets the
    /// run while keeping the longest streak and lifetime bonus total.
    pub async fn touch_streak(&self, address: &Address, today: NaiveDate) -> Result<StreakOutcome> {
        let existing = self.get_streak(address).await?.map(|row| StreakRecord {
            last_login: row.last_login_date,
            current_streak: row.current_streak,
            longest_streak: row.longest_streak,
            bonus_points_earned: row.bonus_points_earned,
        });

        let outcome = streak::advance(existing.as_ref(), today);
        let record = &outcome.record;

        sqlx::query(
            r#"
            INSERT INTO daily_streaks
                (address, last_login_date, current_streak, longest_streak, bonus_points_earned)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(address)
            DO UPDATE SET
                last_login_date = excluded.last_login_date,
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                bonus_points_earned = excluded.bonus_points_earned
            "#,
        )
        .bind(address_to_db(address))
        .bind(record.last_login.to_string())
        .bind(record.current_streak as i64)
        .bind(record.longest_streak as i64)
        .bind(record.bonus_points_earned as i64)
        .execute(&self.pool)
        .await
        .context("Failed to upsert streak")?;

        Ok(outcome)
    }
}

fn row_to_streak(row: sqlx::sqlite::SqliteRow) -> Result<StreakRow> {
    let address: String = row.try_get("address")?;
    let last_login_date: String = row.try_get("last_login_date")?;
    let current_streak: i64 = row.try_get("current_streak")?;
    let longest_streak: i64 = row.try_get("longest_streak")?;
    let bonus_points_earned: i64 = row.try_get("bonus_points_earned")?;

    Ok(StreakRow {
        address: address_from_db(&address)?,
        last_login_date: last_login_date
            .parse()
            .with_context(|| format!("Invalid date in database: {}", last_login_date))?,
        current_streak: current_streak as u32,
        longest_streak: longest_streak as u32,
        bonus_points_earned: bonus_points_earned as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifelist_core::streak::StreakStatus;
    use tempfile::NamedTempFile;

    async fn test_storage() -> (Storage, NamedTempFile) {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();
        (storage, temp_db)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_first_login_creates_row() {
        let (storage, _temp) = test_storage().await;
        let addr = Address::repeat_byte(0x22);

        assert!(storage.get_streak(&addr).await.unwrap().is_none());

        let outcome = storage.touch_streak(&addr, date("2026-03-01")).await.unwrap();
        assert_eq!(outcome.status, StreakStatus::Created);
        assert_eq!(outcome.record.current_streak, 1);

        let row = storage.get_streak(&addr).await.unwrap().unwrap();
        assert_eq!(row.last_login_date, date("2026-03-01"));
        assert_eq!(row.current_streak, 1);
        assert_eq!(row.longest_streak, 1);
        assert_eq!(row.bonus_points_earned, 0);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_same_day_login_is_noop() {
        let (storage, _temp) = test_storage().await;
        let addr = Address::repeat_byte(0x22);

        storage.touch_streak(&addr, date("2026-03-01")).await.unwrap();
        let outcome = storage.touch_streak(&addr, date("2026-03-01")).await.unwrap();

        assert_eq!(outcome.status, StreakStatus::NoChange);
        assert_eq!(outcome.change_in_points, 0);

        let row = storage.get_streak(&addr).await.unwrap().unwrap();
        assert_eq!(row.current_streak, 1);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_consecutive_logins_reach_milestone() {
        let (storage, _temp) = test_storage().await;
        let addr = Address::repeat_byte(0x22);

        let mut milestone_payout = 0;
        for day in 1..=7 {
            let outcome = storage
                .touch_streak(&addr, date(&format!("2026-03-{:02}", day)))
                .await
                .unwrap();
            milestone_payout += outcome.change_in_points;
        }

        let row = storage.get_streak(&addr).await.unwrap().unwrap();
        assert_eq!(row.current_streak, 7);
        assert_eq!(row.bonus_points_earned, 50);
        assert_eq!(milestone_payout, 50);

        storage.close().await;
    }

    #[tokio::test]
    async fn test_gap_resets_but_keeps_history() {
        let (storage, _temp) = test_storage().await;
        let addr = Address::repeat_byte(0x22);

        for day in 1..=7 {
            storage
                .touch_streak(&addr, date(&format!("2026-03-{:02}", day)))
                .await
                .unwrap();
        }

        // Two-day gap.
        let outcome = storage.touch_streak(&addr, date("2026-03-10")).await.unwrap();
        assert_eq!(outcome.status, StreakStatus::Created);

        let row = storage.get_streak(&addr).await.unwrap().unwrap();
        assert_eq!(row.current_streak, 1);
        assert_eq!(row.longest_streak, 7);
        assert_eq!(row.bonus_points_earned, 50);

        storage.close().await;
    }
}
