//! Storage layer for the Lifelist indexer.
//!
//! This module provides database operations for:
//! - Points (the identification ledger, best-score-wins per key)
//! - Daily streaks (login state machine)
//! - Backfill cursors (resume positions for the paginated adapter)

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub mod cursor;
pub mod points;
pub mod streak;
pub mod types;

pub use types::*;

/// Database storage for the indexer.
///
/// Provides async access to SQLite database with connection pooling.
#[derive(Debug, Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance with the given database URL.
    ///
    /// This will create the database file if it doesn't exist. Call
    /// [`Storage::run_migrations`] afterwards to bring the schema up to date.
    ///
    /// # Arguments
    /// * `database_url` - SQLite database URL (e.g., "sqlite://lifelist.db")
    /// * `max_connections` - Pool maximum (defaults to 5)
    /// * `min_connections` - Pool minimum (defaults to 1)
    pub async fn new(
        database_url: &str,
        max_connections: Option<u32>,
        min_connections: Option<u32>,
    ) -> Result<Self> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.unwrap_or(5))
            .min_connections(min_connections.unwrap_or(1))
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Create a new storage instance with a specific file path.
    pub async fn new_with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let database_url = format!("sqlite://{}", path.display());
        Self::new(&database_url, None, None).await
    }

    /// Run database migrations.
    ///
    /// This should be called once during initialization to ensure the schema is up to date.
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Migrations completed successfully");

        Ok(())
    }

    /// Get a reference to the connection pool.
    ///
    /// This is useful for custom queries or transactions.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        info!("Closing database connection");
        self.pool.close().await;
    }

    /// Get database statistics.
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let point_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points")
            .fetch_one(&self.pool)
            .await?;

        let streak_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_streaks")
            .fetch_one(&self.pool)
            .await?;

        let player_count: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT address) FROM points")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            point_count: point_count as u64,
            streak_count: streak_count as u64,
            player_count: player_count as u64,
        })
    }

    /// Check database health.
    pub async fn health_check(&self) -> Result<()> {
        // Simple query to check if database is responsive
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;

        Ok(())
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of point ledger rows
    pub point_count: u64,

    /// Total number of streak rows
    pub streak_count: u64,

    /// Number of distinct players holding points
    pub player_count: u64,
}
