//! Query helpers over the shared ledger database.
//!
//! The API reads the tables maintained by the indexer service. Aggregations
//! are grouped SQL rather than in-memory scans so they stay cheap as the
//! ledger grows.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use lifelist_core::streak::{self, StreakOutcome, StreakRecord};
use sqlx::SqlitePool;

/// Canonical database encoding for an address: lowercase 0x-prefixed hex.
pub fn encode_address(address: &Address) -> String {
    format!("{:#x}", address)
}

/// One row of the season points leaderboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PointsTotalRow {
    /// Player address, database encoding.
    pub address: String,
    /// Summed points across the player's species records this season.
    pub total: i64,
}

/// One row of the cross-season species leaderboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SpeciesCountRow {
    /// Player address, database encoding.
    pub address: String,
    /// Distinct species identified across all seasons.
    pub species_count: i64,
}

/// A player's total and dense position within one ranking.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RankedTotal {
    /// The ranked value (points total or species count).
    pub total: i64,
    /// 1-based rank under the same ordering the leaderboard uses.
    pub rank: i64,
}

/// One ledger row of a player's life list.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LifeListRow {
    /// Season the identification counts toward.
    pub season: String,
    /// Identified species.
    pub species_id: i64,
    /// Points credited.
    pub amount: i64,
    /// Token whose event earned the credit.
    pub token_id: i64,
    /// Event timestamp (unix seconds).
    pub timestamp_u64: i64,
}

/// One row of the active daily-streak leaderboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StreakLeaderRow {
    /// Player address, database encoding.
    pub address: String,
    /// Consecutive-day count including the last login.
    pub current_streak: i64,
}

/// A player's stored daily streak state.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StreakDbRow {
    /// Date of the most recent counted login, ISO `YYYY-MM-DD`.
    pub last_login_date: String,
    /// Consecutive-day count including the last login.
    pub current_streak: i64,
    /// Longest run ever achieved.
    pub longest_streak: i64,
    /// Lifetime milestone bonus total.
    pub bonus_points_earned: i64,
}

/// Top players by summed points within one season.
///
/// Ties are broken by address so the ordering is total.
pub async fn points_leaderboard(
    pool: &SqlitePool,
    season: &str,
    limit: i64,
) -> Result<Vec<PointsTotalRow>> {
    sqlx::query_as::<_, PointsTotalRow>(
        r#"
        SELECT address, SUM(amount) AS total
        FROM points
        WHERE season = ?
        GROUP BY address
        ORDER BY total DESC, address ASC
        LIMIT ?
        "#,
    )
    .bind(season)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to query points leaderboard")
}

/// A player's season total and rank, or `None` when they hold no records.
///
/// The rank counts players strictly ahead under the leaderboard's ordering,
/// so it agrees with the position the player would occupy in a full listing.
pub async fn points_rank(
    pool: &SqlitePool,
    season: &str,
    address: &str,
) -> Result<Option<RankedTotal>> {
    sqlx::query_as::<_, RankedTotal>(
        r#"
        WITH totals AS (
            SELECT address, SUM(amount) AS total
            FROM points
            WHERE season = ?
            GROUP BY address
        )
        SELECT t.total AS total,
               (
                   SELECT COUNT(*) + 1
                   FROM totals o
                   WHERE o.total > t.total
                      OR (o.total = t.total AND o.address < t.address)
               ) AS rank
        FROM totals t
        WHERE t.address = ?
        "#,
    )
    .bind(season)
    .bind(address)
    .fetch_optional(pool)
    .await
    .context("Failed to query points rank")
}

/// Top players by distinct species identified, across all seasons.
pub async fn species_leaderboard(pool: &SqlitePool, limit: i64) -> Result<Vec<SpeciesCountRow>> {
    sqlx::query_as::<_, SpeciesCountRow>(
        r#"
        SELECT address, COUNT(DISTINCT species_id) AS species_count
        FROM points
        GROUP BY address
        ORDER BY species_count DESC, address ASC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to query species leaderboard")
}

/// A player's distinct species count and rank, or `None` with no records.
pub async fn species_rank(pool: &SqlitePool, address: &str) -> Result<Option<RankedTotal>> {
    sqlx::query_as::<_, RankedTotal>(
        r#"
        WITH counts AS (
            SELECT address, COUNT(DISTINCT species_id) AS species_count
            FROM points
            GROUP BY address
        )
        SELECT c.species_count AS total,
               (
                   SELECT COUNT(*) + 1
                   FROM counts o
                   WHERE o.species_count > c.species_count
                      OR (o.species_count = c.species_count AND o.address < c.address)
               ) AS rank
        FROM counts c
        WHERE c.address = ?
        "#,
    )
    .bind(address)
    .fetch_optional(pool)
    .await
    .context("Failed to query species rank")
}

/// Top players by active daily streak.
///
/// A streak is active when its last counted login was today or yesterday;
/// anything older is a broken run waiting for its reset touch and is left
/// off the board.
pub async fn streak_leaderboard(
    pool: &SqlitePool,
    today: NaiveDate,
    limit: i64,
) -> Result<Vec<StreakLeaderRow>> {
    let yesterday = today.pred_opt().unwrap_or(today);

    sqlx::query_as::<_, StreakLeaderRow>(
        r#"
        SELECT address, current_streak
        FROM daily_streaks
        WHERE last_login_date IN (?, ?)
        ORDER BY current_streak DESC, address ASC
        LIMIT ?
        "#,
    )
    .bind(today.to_string())
    .bind(yesterday.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to query streak leaderboard")
}

/// A player's active streak and rank, or `None` when their streak is broken
/// or they never logged in.
pub async fn streak_rank(
    pool: &SqlitePool,
    today: NaiveDate,
    address: &str,
) -> Result<Option<RankedTotal>> {
    let yesterday = today.pred_opt().unwrap_or(today);

    sqlx::query_as::<_, RankedTotal>(
        r#"
        WITH active AS (
            SELECT address, current_streak
            FROM daily_streaks
            WHERE last_login_date IN (?, ?)
        )
        SELECT a.current_streak AS total,
               (
                   SELECT COUNT(*) + 1
                   FROM active o
                   WHERE o.current_streak > a.current_streak
                      OR (o.current_streak = a.current_streak AND o.address < a.address)
               ) AS rank
        FROM active a
        WHERE a.address = ?
        "#,
    )
    .bind(today.to_string())
    .bind(yesterday.to_string())
    .bind(address)
    .fetch_optional(pool)
    .await
    .context("Failed to query streak rank")
}

/// Every ledger row for one player, ordered by season then species.
pub async fn life_list(pool: &SqlitePool, address: &str) -> Result<Vec<LifeListRow>> {
    sqlx::query_as::<_, LifeListRow>(
        r#"
        SELECT season, species_id, amount, token_id, timestamp_u64
        FROM points
        WHERE address = ?
        ORDER BY season ASC, species_id ASC
        "#,
    )
    .bind(address)
    .fetch_all(pool)
    .await
    .context("Failed to query life list")
}

/// A player's streak row, if they have logged in before.
pub async fn get_streak(pool: &SqlitePool, address: &str) -> Result<Option<StreakDbRow>> {
    sqlx::query_as::<_, StreakDbRow>(
        r#"
        SELECT last_login_date, current_streak, longest_streak, bonus_points_earned
        FROM daily_streaks
        WHERE address = ?
        "#,
    )
    .bind(address)
    .fetch_optional(pool)
    .await
    .context("Failed to query streak")
}

/// Register a login for `today` and persist the resulting streak state.
///
/// Same transition the indexer uses; same-day repeats are no-ops, so the
/// endpoint is safe to call on every page load.
pub async fn touch_streak(
    pool: &SqlitePool,
    address: &str,
    today: NaiveDate,
) -> Result<StreakOutcome> {
    let existing = get_streak(pool, address)
        .await?
        .map(|row| streak_record_from_row(&row))
        .transpose()?;

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
    .bind(address)
    .bind(record.last_login.to_string())
    .bind(record.current_streak as i64)
    .bind(record.longest_streak as i64)
    .bind(record.bonus_points_earned as i64)
    .execute(pool)
    .await
    .context("Failed to upsert streak")?;

    Ok(outcome)
}

/// Decode a stored streak row into the core transition type.
pub fn streak_record_from_row(row: &StreakDbRow) -> Result<StreakRecord> {
    Ok(StreakRecord {
        last_login: row
            .last_login_date
            .parse()
            .with_context(|| format!("Invalid date in database: {}", row.last_login_date))?,
        current_streak: row.current_streak as u32,
        longest_streak: row.longest_streak as u32,
        bonus_points_earned: row.bonus_points_earned as u64,
    })
}
