use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::amount::{format_native, serde_native};
use crate::error::ConfigError;

/// Environment variable holding the signing key.
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

const MONAD_TESTNET_CHAIN_ID: u64 = 74601;
const MONAD_TESTNET_RPC: &str = "https://testnet-rpc.monad.xyz";
const MONAD_TESTNET_EXPLORER: &str = "https://testnet.monadexplorer.com/";
const WMON_ADDRESS: &str = "0x760AfE86e5de5fa0Ee542fc7B7B713e1c5425701";
const TOKEN_FACTORY_ADDRESS: &str = "0xDbdC675219e74C3C8664008DFC7894A2c8838094";

// 0.01 and 0.2 native units
const DEFAULT_LAUNCH_FEE_WEI: u64 = 10_000_000_000_000_000;
const DEFAULT_LAUNCH_APPROVAL_WEI: u64 = 200_000_000_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddresses {
    pub token_factory: Address,
    /// Wrapped native token; launch fees are approved against it.
    pub wrapped_native: Address,
    /// Router handed to `graduate`. Falls back to the wrapped native token
    /// address when unset.
    #[serde(default)]
    pub dex_router: Option<Address>,
}

impl ContractAddresses {
    pub fn graduation_router(&self) -> Address {
        self.dex_router.unwrap_or(self.wrapped_native)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationPolicy {
    pub poll_interval_ms: u64,
    /// Polls of a missing transaction before it is treated as dropped.
    pub retries: usize,
}

impl ConfirmationPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            retries: 10,
        }
    }
}

/// Everything the client needs to talk to one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub native_currency: NativeCurrency,
    #[serde(default)]
    pub explorer_url: Option<String>,
    pub contracts: ContractAddresses,
    #[serde(with = "serde_native")]
    pub launch_fee: U256,
    #[serde(with = "serde_native")]
    pub launch_approval: U256,
    #[serde(default)]
    pub confirmation: ConfirmationPolicy,
}

impl NetworkConfig {
    pub fn monad_testnet() -> Self {
        Self {
            name: "Monad Testnet".to_string(),
            chain_id: MONAD_TESTNET_CHAIN_ID,
            rpc_url: MONAD_TESTNET_RPC.to_string(),
            native_currency: NativeCurrency {
                name: "Monad".to_string(),
                symbol: "MON".to_string(),
                decimals: 18,
            },
            explorer_url: Some(MONAD_TESTNET_EXPLORER.to_string()),
            contracts: ContractAddresses {
                token_factory: parse_address(TOKEN_FACTORY_ADDRESS),
                wrapped_native: parse_address(WMON_ADDRESS),
                dex_router: None,
            },
            launch_fee: U256::from(DEFAULT_LAUNCH_FEE_WEI),
            launch_approval: U256::from(DEFAULT_LAUNCH_APPROVAL_WEI),
            confirmation: ConfirmationPolicy::default(),
        }
    }

    /// Load a config from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!(network = %config.name, chain_id = config.chain_id, "loaded network config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launch_approval < self.launch_fee {
            return Err(ConfigError::ApprovalBelowFee {
                approval: format_native(self.launch_approval),
                fee: format_native(self.launch_fee),
            });
        }
        Ok(())
    }

    /// Build the signing wallet from an out-of-band key. Fails before any
    /// network call when the key is absent.
    pub fn signer(&self, private_key: Option<&str>) -> Result<LocalWallet, ConfigError> {
        let key = private_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingSigner)?;
        let wallet = LocalWallet::from_str(key)
            .map_err(|e| ConfigError::InvalidSigner(e.to_string()))?;
        Ok(wallet.with_chain_id(self.chain_id))
    }
}

fn parse_address(raw: &str) -> Address {
    raw.parse().unwrap_or_default()
}
