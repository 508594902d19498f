use std::collections::HashMap;

use ethers::types::{Address, U256};

use super::error::FactoryError;

/// 0.01 native units
pub const DEFAULT_LAUNCH_FEE: u64 = 10_000_000_000_000_000;

/// Metadata recorded for every launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub token: Address,
    pub curve: Address,
    pub creator: Address,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub graduation_market_cap: U256,
}

#[derive(Debug, Clone)]
pub struct TokenFactory {
    pub owner: Address,
    pub dex_factory: Address,
    pub dex_router: Address,
    pub wrapped_native: Address,
    pub launch_fee: U256,
    launched: Vec<Address>,
    infos: HashMap<Address, TokenInfo>,
}

impl TokenFactory {
    pub fn new(
        owner: Address,
        dex_factory: Address,
        dex_router: Address,
        wrapped_native: Address,
    ) -> Self {
        Self {
            owner,
            dex_factory,
            dex_router,
            wrapped_native,
            launch_fee: U256::from(DEFAULT_LAUNCH_FEE),
            launched: Vec::new(),
            infos: HashMap::new(),
        }
    }

    pub fn launched_tokens(&self) -> &[Address] {
        &self.launched
    }

    pub fn token_info(&self, token: Address) -> Option<&TokenInfo> {
        self.infos.get(&token)
    }

    pub fn record_launch(&mut self, info: TokenInfo) {
        self.launched.push(info.token);
        self.infos.insert(info.token, info);
    }

    pub fn require_owner(&self, caller: Address) -> Result<(), FactoryError> {
        if caller != self.owner {
            return Err(FactoryError::Unauthorized);
        }
        Ok(())
    }

    /// A fee paid as transaction value must match exactly.
    pub fn check_paid_fee(&self, value: U256) -> Result<(), FactoryError> {
        if value != self.launch_fee {
            return Err(FactoryError::IncorrectLaunchFee);
        }
        Ok(())
    }
}
