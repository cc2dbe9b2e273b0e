//! Identified-token tracking.
//!
//! A token's species becomes public the moment the token is identified
//! on-chain; identification is irreversible. The set therefore only grows:
//! a positive answer from the contract is remembered for the life of the
//! process, while a negative answer (or an RPC failure) is never cached and
//! gets re-checked on the next request.

use alloy::providers::{ProviderBuilder, RootProvider};
use alloy::sol;
use alloy::transports::http::{Client, Http};
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use lifelist_core::types::TokenId;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::debug;

sol! {
    #[sol(rpc)]
    contract LifelistCollection {
        function ownerOf(uint256 tokenId) external view returns (address owner);
    }
}

type HttpProvider = RootProvider<Http<Client>>;

/// Read-only client for the collection contract.
pub struct ChainClient {
    contract: LifelistCollection::LifelistCollectionInstance<Http<Client>, HttpProvider>,
}

impl ChainClient {
    /// Create a client for the collection contract at `contract_address`.
    pub fn new(rpc_url: &str, contract_address: Address) -> Result<Self> {
        let url = rpc_url
            .parse()
            .with_context(|| format!("Invalid RPC URL: {}", rpc_url))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self {
            contract: LifelistCollection::new(contract_address, provider),
        })
    }

    /// Whether the token has been identified on-chain.
    ///
    /// `ownerOf` reverts for tokens that have not been identified yet, so a
    /// failed call is reported as unidentified. Transport errors land in the
    /// same bucket; the caller retries on the next request because negative
    /// answers are never cached.
    pub async fn is_identified(&self, token_id: TokenId) -> bool {
        match self
            .contract
            .ownerOf(U256::from(token_id.value()))
            .call()
            .await
        {
            Ok(ret) => {
                debug!(token_id = token_id.value(), owner = %ret.owner, "Token is identified");
                true
            }
            Err(e) => {
                debug!(
                    token_id = token_id.value(),
                    "ownerOf call failed, treating as unidentified: {}", e
                );
                false
            }
        }
    }
}

/// Monotonic set of tokens known to be identified.
///
/// Passed explicitly to the handlers that need it; entries are only ever
/// added. Without a chain client every token reads as unidentified.
pub struct IdentifiedSet {
    known: RwLock<HashSet<u32>>,
    chain: Option<ChainClient>,
}

impl IdentifiedSet {
    /// Create an empty set backed by an optional chain client.
    pub fn new(chain: Option<ChainClient>) -> Self {
        Self {
            known: RwLock::new(HashSet::new()),
            chain,
        }
    }

    /// Create a set pre-seeded with known-identified tokens and no client.
    pub fn with_tokens(tokens: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            known: RwLock::new(tokens.into_iter().map(|t| t.value()).collect()),
            chain: None,
        }
    }

    /// Whether the token is identified, consulting the chain on a miss.
    pub async fn is_identified(&self, token_id: TokenId) -> bool {
        if self.known.read().await.contains(&token_id.value()) {
            return true;
        }

        let Some(chain) = &self.chain else {
            return false;
        };

        if chain.is_identified(token_id).await {
            self.mark(token_id).await;
            true
        } else {
            false
        }
    }

    /// Record a token as identified.
    pub async fn mark(&self, token_id: TokenId) {
        self.known.write().await.insert(token_id.value());
    }

    /// Number of tokens known to be identified.
    pub async fn len(&self) -> usize {
        self.known.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(id: u32) -> TokenId {
        TokenId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_without_client_everything_is_unidentified() {
        let set = IdentifiedSet::new(None);
        assert!(!set.is_identified(token(42)).await);
        assert_eq!(set.len().await, 0);
    }

    #[tokio::test]
    async fn test_marked_tokens_stay_identified() {
        let set = IdentifiedSet::new(None);
        set.mark(token(42)).await;

        assert!(set.is_identified(token(42)).await);
        assert!(!set.is_identified(token(43)).await);

        // Marking again is a no-op.
        set.mark(token(42)).await;
        assert_eq!(set.len().await, 1);
    }

    #[tokio::test]
    async fn test_pre_seeded_set() {
        let set = IdentifiedSet::with_tokens([token(1), token(2)]);
        assert!(set.is_identified(token(1)).await);
        assert!(set.is_identified(token(2)).await);
        assert!(!set.is_identified(token(3)).await);
    }
}
