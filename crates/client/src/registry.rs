//! Read-only projection of every token the factory has launched.

use std::sync::Arc;

use ethers::types::{Address, U256};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::abi;
use crate::amount::{format_native, serde_native};
use crate::chain::ChainClient;
use crate::error::ChainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedToken {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    /// Owner of the token, which is its bonding curve.
    pub curve_address: Address,
    pub is_graduated: bool,
    /// Native balance held by the curve.
    #[serde(with = "serde_native")]
    pub market_cap: U256,
}

impl LaunchedToken {
    pub fn market_cap_display(&self) -> String {
        format_native(self.market_cap)
    }
}

/// A token whose details could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub token: Address,
    pub error: ChainError,
}

/// Result of one pass over the factory list, in factory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub tokens: Vec<LaunchedToken>,
    pub failures: Vec<FetchFailure>,
}

pub struct TokenRegistryView<C> {
    client: Arc<C>,
    factory: Address,
    tokens: Vec<LaunchedToken>,
    failures: Vec<FetchFailure>,
}

impl<C: ChainClient> TokenRegistryView<C> {
    pub fn new(client: Arc<C>, factory: Address) -> Self {
        Self {
            client,
            factory,
            tokens: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn tokens(&self) -> &[LaunchedToken] {
        &self.tokens
    }

    /// Tokens omitted from the last refresh and why.
    pub fn failures(&self) -> &[FetchFailure] {
        &self.failures
    }

    pub fn get(&self, address: Address) -> Option<&LaunchedToken> {
        self.tokens.iter().find(|token| token.address == address)
    }

    /// Read the factory list and every token's details. Tokens are fetched
    /// concurrently; a failing token is reported without failing the rest.
    pub async fn fetch(&self) -> Result<RegistrySnapshot, ChainError> {
        let list = abi::function(abi::factory(), abi::GET_LAUNCHED_TOKENS)?;
        let addresses = abi::into_addresses(self.client.call_view(self.factory, list, &[]).await?)?;
        debug!(count = addresses.len(), "fetching launched tokens");

        let client = self.client.as_ref();
        let results = join_all(addresses.iter().map(|&address| fetch_token(client, address))).await;

        let mut snapshot = RegistrySnapshot::default();
        for (token, result) in addresses.into_iter().zip(results) {
            match result {
                Ok(launched) => snapshot.tokens.push(launched),
                Err(error) => {
                    warn!(token = ?token, error = %error, "skipping token");
                    snapshot.failures.push(FetchFailure { token, error });
                }
            }
        }
        Ok(snapshot)
    }

    /// Replace the held tokens with `snapshot`.
    ///
    /// A token never goes back from graduated to not graduated, and a token
    /// whose curve address changed keeps its previous entry and is reported.
    pub fn apply(&mut self, snapshot: RegistrySnapshot) {
        let RegistrySnapshot {
            tokens,
            mut failures,
        } = snapshot;
        let mut next = Vec::with_capacity(tokens.len());
        for mut token in tokens {
            match self.get(token.address) {
                Some(known) if known.curve_address != token.curve_address => {
                    warn!(token = ?token.address, "curve address changed; keeping known entry");
                    failures.push(FetchFailure {
                        token: token.address,
                        error: ChainError::Decode(format!(
                            "owner changed from {:?} to {:?}",
                            known.curve_address, token.curve_address
                        )),
                    });
                    next.push(known.clone());
                    continue;
                }
                Some(known) if known.is_graduated => token.is_graduated = true,
                _ => {}
            }
            next.push(token);
        }
        info!(tokens = next.len(), failures = failures.len(), "registry refreshed");
        self.tokens = next;
        self.failures = failures;
    }

    /// Fetch and apply. Held state is untouched if the factory list cannot
    /// be read.
    pub async fn refresh(&mut self) -> Result<&[LaunchedToken], ChainError> {
        let snapshot = self.fetch().await?;
        self.apply(snapshot);
        Ok(&self.tokens)
    }
}

/// name, symbol and owner in order, then the curve's status and balance.
async fn fetch_token<C: ChainClient>(client: &C, address: Address) -> Result<LaunchedToken, ChainError> {
    let token = abi::token();
    let name = abi::into_string(
        client
            .call_view(address, abi::function(token, abi::NAME)?, &[])
            .await?,
    )?;
    let symbol = abi::into_string(
        client
            .call_view(address, abi::function(token, abi::SYMBOL)?, &[])
            .await?,
    )?;
    let curve_address = abi::into_address(
        client
            .call_view(address, abi::function(token, abi::OWNER)?, &[])
            .await?,
    )?;
    let is_graduated = abi::into_bool(
        client
            .call_view(
                curve_address,
                abi::function(abi::curve(), abi::IS_GRADUATED)?,
                &[],
            )
            .await?,
    )?;
    let market_cap = client.balance(curve_address).await?;

    Ok(LaunchedToken {
        address,
        name,
        symbol,
        curve_address,
        is_graduated,
        market_cap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devnet::Devnet;
    use crate::testing::{buy, chain, ether, launch, milli};

    #[tokio::test]
    async fn test_refresh_lists_every_launched_token() {
        let (devnet, config) = chain().await;
        let first = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        let second = launch(&devnet, &config, "Other", "OTH", ether(2)).await;
        buy(&devnet, first.curve, milli(10)).await;

        let mut registry = TokenRegistryView::new(Arc::new(devnet), config.contracts.token_factory);
        let tokens = registry.refresh().await.unwrap().to_vec();

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].address, first.token);
        assert_eq!(tokens[0].name, "My Token");
        assert_eq!(tokens[0].symbol, "MTK");
        assert_eq!(tokens[0].curve_address, first.curve);
        assert_eq!(tokens[0].market_cap, milli(10));
        assert_eq!(tokens[0].market_cap_display(), "0.01");
        assert!(!tokens[0].is_graduated);
        assert_eq!(tokens[1].address, second.token);
        assert!(tokens[1].market_cap.is_zero());
        assert!(registry.failures().is_empty());
    }

    #[tokio::test]
    async fn test_failing_token_is_omitted_and_reported() {
        let (devnet, config) = chain().await;
        let healthy = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        let broken = launch(&devnet, &config, "Broken", "BRK", ether(1)).await;
        devnet.fail_reads_from(broken.curve);

        let mut registry =
            TokenRegistryView::new(Arc::new(devnet.clone()), config.contracts.token_factory);
        let tokens = registry.refresh().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].address, healthy.token);

        assert_eq!(registry.failures().len(), 1);
        assert_eq!(registry.failures()[0].token, broken.token);
        assert!(matches!(registry.failures()[0].error, ChainError::Connection(_)));
    }

    #[tokio::test]
    async fn test_failing_list_call_keeps_previous_state() {
        let (devnet, config) = chain().await;
        launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        let factory = config.contracts.token_factory;

        let mut registry = TokenRegistryView::new(Arc::new(devnet.clone()), factory);
        registry.refresh().await.unwrap();
        devnet.fail_reads_from(factory);

        assert!(matches!(registry.refresh().await, Err(ChainError::Connection(_))));
        assert_eq!(registry.tokens().len(), 1);
    }

    #[tokio::test]
    async fn test_repeated_fetch_is_stable() {
        let (devnet, config) = chain().await;
        let launched = launch(&devnet, &config, "My Token", "MTK", ether(1)).await;
        buy(&devnet, launched.curve, milli(20)).await;

        let registry = TokenRegistryView::new(Arc::new(devnet), config.contracts.token_factory);
        let first = registry.fetch().await.unwrap();
        let second = registry.fetch().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reads_need_no_wallet() {
        let (devnet, config) = chain().await;
        launch(&devnet, &config, "My Token", "MTK", ether(1)).await;

        let reader: Devnet = devnet.disconnect();
        let registry = TokenRegistryView::new(Arc::new(reader), config.contracts.token_factory);
        assert_eq!(registry.fetch().await.unwrap().tokens.len(), 1);
    }

    fn token(address: u64, curve: u64, is_graduated: bool) -> LaunchedToken {
        LaunchedToken {
            address: Address::from_low_u64_be(address),
            name: "My Token".into(),
            symbol: "MTK".into(),
            curve_address: Address::from_low_u64_be(curve),
            is_graduated,
            market_cap: U256::zero(),
        }
    }

    #[test]
    fn test_apply_keeps_graduation_and_curve() {
        let mut registry = TokenRegistryView::new(Arc::new(Devnet::new()), Address::zero());
        registry.apply(RegistrySnapshot {
            tokens: vec![token(1, 10, true), token(2, 20, false)],
            failures: vec![],
        });

        registry.apply(RegistrySnapshot {
            tokens: vec![token(1, 10, false), token(2, 21, true)],
            failures: vec![],
        });
        assert!(registry.tokens()[0].is_graduated);
        assert_eq!(registry.tokens()[1], token(2, 20, false));
        assert_eq!(registry.failures().len(), 1);
        assert_eq!(registry.failures()[0].token, Address::from_low_u64_be(2));
    }
}
