//! Configuration management for the Lifelist indexer.
//!
//! This module handles loading configuration from:
//! - TOML files
//! - Environment variables (via `${VAR_NAME}` placeholders)
//! - Default values (fallbacks)

use alloy_primitives::Address;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lifelist_core::types::SeasonId;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network and contract configuration
    pub network: NetworkConfig,

    /// Backfill adapter configuration
    pub backfill: BackfillConfig,

    /// Live stream adapter configuration
    pub stream: StreamConfig,

    /// Active season window
    pub season: SeasonConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Species registry configuration
    pub registry: RegistryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network and contract configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Chain name as used by the event APIs (e.g., "base")
    pub chain: String,

    /// Chain ID (e.g., 8453 for Base)
    pub chain_id: u64,

    /// The collection's NFT contract address
    pub contract_address: Address,
}

/// Backfill adapter configuration (cursor-paginated marketplace API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Events endpoint URL, queried with `limit` and `next` parameters
    pub api_url: String,

    /// API key sent as the `x-api-key` header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Page size requested per fetch
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Seconds to wait between drained runs before polling again
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum fetch attempts per page before the run fails
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay in milliseconds (doubled per retry)
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_retry_cap_ms")]
    pub retry_cap_ms: u64,
}

/// Live stream adapter configuration (marketplace websocket).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Enable the live websocket adapter
    #[serde(default = "default_stream_enabled")]
    pub enabled: bool,

    /// Websocket endpoint URL
    pub ws_url: String,

    /// Collection slug used in the subscription message
    pub collection_slug: String,

    /// Base reconnect delay in milliseconds (doubled per failure)
    #[serde(default = "default_retry_base_ms")]
    pub reconnect_base_ms: u64,

    /// Reconnect delay ceiling in milliseconds
    #[serde(default = "default_retry_cap_ms")]
    pub reconnect_cap_ms: u64,
}

/// Active season window.
///
/// Events timestamped outside `[starts_at, ends_at)` are dropped before
/// scoring; the ledger key still carries the season so past seasons stay
/// queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonConfig {
    /// The season new credits are written under
    pub active: SeasonId,

    /// Inclusive window start
    pub starts_at: DateTime<Utc>,

    /// Exclusive window end
    pub ends_at: DateTime<Utc>,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://lifelist.db")
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Species registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding `collection-{n}.json` species files
    pub species_dir: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_page_size() -> u32 {
    50
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_cap_ms() -> u64 {
    30_000
}

fn default_stream_enabled() -> bool {
    true
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `api_key = "${MARKETPLACE_API_KEY}"`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        // Expand environment variables before parsing
        let expanded = Self::expand_env_vars(&contents)?;

        let config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.network.chain.is_empty() {
            anyhow::bail!("Network chain cannot be empty");
        }
        if self.network.chain_id == 0 {
            anyhow::bail!("Chain ID must be non-zero");
        }
        if self.network.contract_address.is_zero() {
            anyhow::bail!("Network contract_address must be a non-zero address");
        }

        if self.backfill.api_url.is_empty() {
            anyhow::bail!("Backfill api_url cannot be empty");
        }
        if self.backfill.page_size == 0 {
            anyhow::bail!("Backfill page_size must be > 0");
        }
        if self.backfill.poll_interval_secs == 0 {
            anyhow::bail!("Backfill poll_interval_secs must be > 0");
        }
        if self.backfill.retry_base_ms == 0 {
            anyhow::bail!("Backfill retry_base_ms must be > 0");
        }

        if self.stream.enabled {
            if self.stream.ws_url.is_empty() {
                anyhow::bail!("Stream ws_url cannot be empty when the stream is enabled");
            }
            if self.stream.collection_slug.is_empty() {
                anyhow::bail!("Stream collection_slug cannot be empty when the stream is enabled");
            }
        }

        if self.season.starts_at >= self.season.ends_at {
            anyhow::bail!(
                "Season starts_at ({}) must precede ends_at ({})",
                self.season.starts_at,
                self.season.ends_at
            );
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.registry.species_dir.is_empty() {
            anyhow::bail!("Registry species_dir cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }

    /// Expand environment variables in the format `${VAR_NAME}`.
    ///
    /// Placeholders inside TOML comments are left untouched; placeholders
    /// inside strings (basic, literal, and their multiline forms) expand
    /// normally. Returns an error when a referenced variable is not set.
    fn expand_env_vars(input: &str) -> Result<String> {
        let mut result = String::new();
        let mut chars = input.chars().peekable();
        let mut in_double_quote = false;
        let mut in_single_quote = false;
        let mut in_multiline_double = false;
        let mut in_multiline_single = false;
        let mut in_comment = false;
        let mut escape_next = false;
        let mut pos = 0;

        while let Some(ch) = chars.next() {
            pos += 1;

            if escape_next {
                escape_next = false;
                result.push(ch);
                continue;
            }

            if ch == '\\' && (in_double_quote || in_multiline_double) {
                escape_next = true;
                result.push(ch);
                continue;
            }

            let in_any_string =
                in_double_quote || in_single_quote || in_multiline_double || in_multiline_single;

            if ch == '"' && !in_single_quote && !in_multiline_single && !in_comment {
                if Self::is_triple_quote(&mut chars, '"') {
                    in_multiline_double = !in_multiline_double;
                    result.push(ch);
                    result.push(chars.next().unwrap());
                    result.push(chars.next().unwrap());
                    pos += 2;
                } else {
                    if !in_multiline_double {
                        in_double_quote = !in_double_quote;
                    }
                    result.push(ch);
                }
            } else if ch == '\'' && !in_double_quote && !in_multiline_double && !in_comment {
                if Self::is_triple_quote(&mut chars, '\'') {
                    in_multiline_single = !in_multiline_single;
                    result.push(ch);
                    result.push(chars.next().unwrap());
                    result.push(chars.next().unwrap());
                    pos += 2;
                } else {
                    if !in_multiline_single {
                        in_single_quote = !in_single_quote;
                    }
                    result.push(ch);
                }
            } else if ch == '#' && !in_any_string && !in_comment {
                in_comment = true;
                result.push(ch);
            } else if ch == '\n' {
                // End of line resets comment state (but not string state)
                in_comment = false;
                result.push(ch);
            } else if ch == '$' && !in_comment && chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                pos += 1;

                let mut var_name = String::new();
                let mut found_close = false;
                while let Some(&c) = chars.peek() {
                    pos += 1;
                    if c == '}' {
                        chars.next(); // consume '}'
                        found_close = true;
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }

                if !found_close {
                    anyhow::bail!(
                        "Unclosed environment variable placeholder at position {}",
                        pos
                    );
                }

                if var_name.is_empty() {
                    anyhow::bail!("Empty environment variable name at position {}", pos);
                }

                match std::env::var(&var_name) {
                    Ok(value) => result.push_str(&value),
                    Err(_) => {
                        anyhow::bail!(
                            "Environment variable '{}' is not set (referenced at position {})",
                            var_name,
                            pos
                        );
                    }
                }
            } else {
                result.push(ch);
            }
        }

        Ok(result)
    }

    /// Check if the next two characters match the given quote character (for triple-quote detection).
    fn is_triple_quote(chars: &mut std::iter::Peekable<std::str::Chars>, quote_char: char) -> bool {
        let mut temp = chars.clone();
        temp.next() == Some(quote_char) && temp.next() == Some(quote_char)
    }
}
