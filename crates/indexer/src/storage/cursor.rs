//! Backfill cursor persistence.

use super::Storage;
use anyhow::{Context, Result};
use sqlx::Row;

impl Storage {
    /// Fetch the saved resume cursor for a backfill source.
    ///
    /// `Ok(None)` means the source has never been backfilled or its last run
    /// drained to the end of the event history.
    pub async fn get_backfill_cursor(&self, source: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT cursor
            FROM backfill_cursors
            WHERE source = ?
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch backfill cursor")?;

        match row {
            Some(row) => {
                let cursor: Option<String> = row.try_get("cursor")?;
                Ok(cursor)
            }
            None => Ok(None),
        }
    }

    /// Persist the resume cursor for a backfill source.
    ///
    /// Pass `None` after a drained run so the next run starts from the top.
    pub async fn set_backfill_cursor(&self, source: &str, cursor: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backfill_cursors (source, cursor, updated_at)
            VALUES (?, ?, unixepoch())
            ON CONFLICT(source)
            DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source)
        .bind(cursor)
        .execute(&self.pool)
        .await
        .context("Failed to persist backfill cursor")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_cursor_round_trip() {
        let temp_db = NamedTempFile::new().unwrap();
        let storage = Storage::new_with_path(temp_db.path()).await.unwrap();
        storage.run_migrations().await.unwrap();

        assert!(storage.get_backfill_cursor("sales").await.unwrap().is_none());

        storage
            .set_backfill_cursor("sales", Some("page-token-abc"))
            .await
            .unwrap();
        assert_eq!(
            storage.get_backfill_cursor("sales").await.unwrap().as_deref(),
            Some("page-token-abc")
        );

        // Drained: cursor clears but the row stays.
        storage.set_backfill_cursor("sales", None).await.unwrap();
        assert!(storage.get_backfill_cursor("sales").await.unwrap().is_none());

        storage.close().await;
    }
}
