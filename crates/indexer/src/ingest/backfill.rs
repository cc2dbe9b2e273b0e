//! Cursor-paginated backfill adapter.
//!
//! Walks the marketplace's historical event feed page by page, applying each
//! page through the [`EventProcessor`] and persisting the resume cursor after
//! every page. Because crediting is idempotent, a crash between the apply and
//! the cursor write only costs a harmless replay of one page.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::BackfillConfig;
use crate::ingest::event::RawAssetEvent;
use crate::ingest::processor::EventProcessor;
use crate::storage::Storage;

/// Cursor key in `backfill_cursors` for this adapter.
const CURSOR_SOURCE: &str = "marketplace-events";

/// One page of the marketplace's paginated event feed.
#[derive(Debug, Deserialize)]
struct EventPage {
    #[serde(default)]
    asset_events: Vec<RawAssetEvent>,

    /// Opaque cursor for the next page; absent on the last page.
    #[serde(default)]
    next: Option<String>,
}

/// Backfill adapter over the marketplace REST API.
pub struct BackfillAdapter {
    http: reqwest::Client,
    config: BackfillConfig,
    storage: Storage,
    processor: EventProcessor,
}

impl BackfillAdapter {
    /// Create a new backfill adapter.
    pub fn new(config: BackfillConfig, storage: Storage, processor: EventProcessor) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            storage,
            processor,
        }
    }

    /// Run the adapter until shutdown: drain the feed, sleep, repeat.
    ///
    /// Each pass resumes from the persisted cursor and re-walks new history;
    /// replayed pages are absorbed by the ledger's idempotent crediting.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            self.drain().await?;

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Backfill adapter shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(Duration::from_secs(self.config.poll_interval_secs)) => {}
            }
        }
    }

    /// Walk the feed from the persisted cursor to the end, crediting as we go.
    pub async fn drain(&self) -> Result<()> {
        let mut cursor = self.storage.get_backfill_cursor(CURSOR_SOURCE).await?;
        if cursor.is_some() {
            info!("Resuming backfill from persisted cursor");
        } else {
            info!("Starting backfill from the top of the event feed");
        }

        let mut pages = 0u64;
        let mut credited = 0u64;

        loop {
            let page = self.fetch_page(cursor.as_deref()).await?;
            let summary = self.processor.apply_batch(&page.asset_events).await?;

            pages += 1;
            credited += summary.credited;
            if !summary.failed.is_empty() {
                warn!(
                    failures = summary.failed.len(),
                    "Backfill page had malformed events"
                );
            }

            // Persist after applying so a crash replays at most this page.
            self.storage
                .set_backfill_cursor(CURSOR_SOURCE, page.next.as_deref())
                .await?;

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(pages, credited, "Backfill drained to end of feed");
        Ok(())
    }

    /// Fetch one page, retrying transient failures with capped backoff.
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<EventPage> {
        let mut delay = Duration::from_millis(self.config.retry_base_ms);
        let cap = Duration::from_millis(self.config.retry_cap_ms);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            match self.fetch_page_once(cursor).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt <= self.config.max_retries => {
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Backfill fetch failed, retrying: {:#}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(cap);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Backfill fetch failed after {} attempts", attempt)
                    });
                }
            }
        }
    }

    async fn fetch_page_once(&self, cursor: Option<&str>) -> Result<EventPage> {
        let mut request = self
            .http
            .get(&self.config.api_url)
            .query(&[("limit", self.config.page_size.to_string())]);

        if let Some(cursor) = cursor {
            request = request.query(&[("next", cursor)]);
        }
        if let Some(api_key) = &self.config.api_key {
            request = request.header("x-api-key", api_key);
        }

        let response = request
            .send()
            .await
            .context("Backfill request failed")?
            .error_for_status()
            .context("Backfill request returned an error status")?;

        response
            .json::<EventPage>()
            .await
            .context("Failed to decode backfill page")
    }
}
