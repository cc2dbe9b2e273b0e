//! Live websocket adapter.
//!
//! Subscribes to the marketplace's event stream and applies matching events
//! as they arrive. The stream is best-effort: anything missed during a
//! disconnect is recovered by the next backfill pass, so the adapter
//! reconnects forever with capped backoff instead of failing the process.

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{NetworkConfig, StreamConfig};
use crate::ingest::event::RawAssetEvent;
use crate::ingest::processor::EventProcessor;

/// Live stream adapter over the marketplace websocket.
pub struct StreamAdapter {
    config: StreamConfig,
    network: NetworkConfig,
    processor: EventProcessor,
}

impl StreamAdapter {
    /// Create a new stream adapter.
    pub fn new(config: StreamConfig, network: NetworkConfig, processor: EventProcessor) -> Self {
        Self {
            config,
            network,
            processor,
        }
    }

    /// Run the adapter until shutdown, reconnecting on every failure.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let base = Duration::from_millis(self.config.reconnect_base_ms);
        let cap = Duration::from_millis(self.config.reconnect_cap_ms);
        let mut delay = base;

        loop {
            match self.run_connection(&mut shutdown).await {
                Ok(()) => {
                    info!("Stream adapter shutting down");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        "Stream connection lost, reconnecting: {:#}", e
                    );
                }
            }

            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Stream adapter shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(cap);
        }
    }

    /// Hold one connection open until shutdown or a connection error.
    ///
    /// Returns `Ok(())` only on shutdown; every other exit is an error that
    /// triggers a reconnect.
    async fn run_connection(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let (ws, _response) = connect_async(&self.config.ws_url)
            .await
            .context("Failed to connect to event stream")?;
        let (mut write, mut read) = ws.split();

        let subscribe = json!({
            "action": "subscribe",
            "collection_slug": self.config.collection_slug,
            "event_types": ["transfer", "sale"],
        });
        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .context("Failed to send stream subscription")?;

        info!(
            collection = %self.config.collection_slug,
            "Subscribed to live event stream"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_text(&text).await {
                                warn!("Failed to process stream event: {:#}", e);
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            write
                                .send(Message::Pong(payload))
                                .await
                                .context("Failed to answer stream ping")?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            anyhow::bail!("Stream closed by server: {:?}", frame);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(e).context("Stream read failed");
                        }
                        None => {
                            anyhow::bail!("Stream ended unexpectedly");
                        }
                    }
                }
            }
        }
    }

    async fn handle_text(&self, text: &str) -> Result<()> {
        let raw: RawAssetEvent =
            serde_json::from_str(text).context("Failed to decode stream event")?;

        if !event_matches_collection(&self.network, &raw) {
            debug!("Ignoring stream event for another collection");
            return Ok(());
        }

        let outcome = self.processor.apply_raw(&raw).await?;
        debug!(?outcome, "Applied stream event");
        Ok(())
    }
}

/// The stream multiplexes collections; keep only events for ours.
fn event_matches_collection(network: &NetworkConfig, raw: &RawAssetEvent) -> bool {
    let Some(nft) = &raw.nft else {
        return false;
    };

    if let Some(chain) = &nft.chain {
        if !chain.eq_ignore_ascii_case(&network.chain) {
            return false;
        }
    }
    if let Some(contract) = &nft.contract {
        let expected = format!("{:#x}", network.contract_address);
        if !contract.eq_ignore_ascii_case(&expected) {
            return false;
        }
    }

    true
}
