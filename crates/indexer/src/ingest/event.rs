//! Raw marketplace event payloads and their normalization.
//!
//! Both adapters (paginated backfill and live websocket) deliver the same
//! JSON shape, so one normalizer feeds the processor from either side.

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lifelist_core::types::{CanonicalEvent, EventKind, TokenId};
use serde::Deserialize;
use std::str::FromStr;

/// A raw asset event as delivered by the marketplace API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAssetEvent {
    /// Event discriminator: "transfer" or "sale".
    pub event_type: String,

    /// The asset the event concerns.
    #[serde(default)]
    pub nft: Option<RawNft>,

    /// Sender for transfer events.
    #[serde(default)]
    pub from_address: Option<String>,

    /// Recipient for transfer events.
    #[serde(default)]
    pub to_address: Option<String>,

    /// Buyer for sale events.
    #[serde(default)]
    pub buyer: Option<String>,

    /// Seller for sale events.
    #[serde(default)]
    pub seller: Option<String>,

    /// Number of assets moved; anything but 1 is a bundle we ignore.
    #[serde(default = "default_quantity")]
    pub quantity: u64,

    /// Payment details for sale events.
    #[serde(default)]
    pub payment: Option<RawPayment>,

    /// Event timestamp (unix seconds).
    pub event_timestamp: i64,
}

/// Asset identification within a raw event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNft {
    /// Token id as a decimal string.
    pub identifier: String,

    /// Contract address of the asset.
    #[serde(default)]
    pub contract: Option<String>,

    /// Chain name the asset lives on.
    #[serde(default)]
    pub chain: Option<String>,
}

/// Payment details for a sale event.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPayment {
    /// Amount paid, in the token's base unit, as a decimal string.
    pub quantity: String,

    /// Payment token symbol (e.g., "ETH").
    pub symbol: String,

    /// Payment token decimals.
    pub decimals: u8,
}

fn default_quantity() -> u64 {
    1
}

impl RawAssetEvent {
    /// Normalize a raw marketplace event into a [`CanonicalEvent`].
    ///
    /// Returns `Ok(None)` for events that are well-formed but do not qualify
    /// for scoring (bundles, unsupported event types, non-ETH sales). Returns
    /// `Err` for payloads that claim to qualify but are malformed, so callers
    /// can record the failure instead of silently dropping it.
    pub fn normalize(&self) -> Result<Option<CanonicalEvent>> {
        if self.quantity != 1 {
            return Ok(None);
        }

        let nft = self.nft.as_ref().context("Event is missing nft payload")?;
        let token_id = parse_token_id(&nft.identifier)?;

        let (from, to, kind) = match self.event_type.as_str() {
            "transfer" => {
                let from = parse_address(self.from_address.as_deref(), "from_address")?;
                let to = parse_address(self.to_address.as_deref(), "to_address")?;
                (from, to, EventKind::Transfer)
            }
            "sale" => {
                let payment = self.payment.as_ref().context("Sale is missing payment")?;
                // Only native ETH sales are scoreable; ERC-20 priced listings
                // have no comparable reference price.
                if payment.symbol != "ETH" || payment.decimals != 18 {
                    return Ok(None);
                }
                let price_paid = U256::from_str_radix(&payment.quantity, 10)
                    .with_context(|| format!("Invalid payment quantity: {}", payment.quantity))?;

                let from = parse_address(self.seller.as_deref(), "seller")?;
                let to = parse_address(self.buyer.as_deref(), "buyer")?;
                (from, to, EventKind::Sale { price_paid })
            }
            _ => return Ok(None),
        };

        let timestamp: DateTime<Utc> = DateTime::from_timestamp(self.event_timestamp, 0)
            .with_context(|| format!("Invalid event timestamp: {}", self.event_timestamp))?;

        Ok(Some(CanonicalEvent {
            token_id,
            from,
            to,
            kind,
            timestamp,
        }))
    }
}

fn parse_token_id(identifier: &str) -> Result<TokenId> {
    let raw: u64 = identifier
        .parse()
        .with_context(|| format!("Invalid token identifier: {}", identifier))?;
    let raw = u32::try_from(raw)
        .map_err(|_| anyhow::anyhow!("Token identifier out of range: {}", identifier))?;
    TokenId::new(raw).with_context(|| format!("Token identifier out of range: {}", identifier))
}

fn parse_address(value: Option<&str>, field: &str) -> Result<Address> {
    let value = value.with_context(|| format!("Event is missing {}", field))?;
    Address::from_str(value).with_context(|| format!("Invalid {}: {}", field, value))
}
