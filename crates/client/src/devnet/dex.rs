use std::collections::HashMap;

use ethers::types::{Address, U256};

use super::error::DexError;

/// Pair registry keyed by sorted token addresses.
#[derive(Debug, Clone)]
pub struct MockDexFactory {
    pub wrapped_native: Address,
    pairs: HashMap<(Address, Address), Address>,
    all_pairs: Vec<Address>,
}

impl MockDexFactory {
    pub fn new(wrapped_native: Address) -> Self {
        Self {
            wrapped_native,
            pairs: HashMap::new(),
            all_pairs: Vec::new(),
        }
    }

    pub fn get_pair(&self, token_a: Address, token_b: Address) -> Option<Address> {
        self.pairs.get(&sort_tokens(token_a, token_b)).copied()
    }

    pub fn all_pairs_length(&self) -> usize {
        self.all_pairs.len()
    }

    pub fn create_pair(
        &mut self,
        token_a: Address,
        token_b: Address,
        pair: Address,
    ) -> Result<Address, DexError> {
        if token_a == token_b {
            return Err(DexError::IdenticalAddresses);
        }
        let key = sort_tokens(token_a, token_b);
        if self.pairs.contains_key(&key) {
            return Err(DexError::PairExists);
        }
        self.pairs.insert(key, pair);
        self.all_pairs.push(pair);
        Ok(pair)
    }
}

/// Liquidity seeded into a pair when a curve graduates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityPosition {
    pub token: Address,
    pub pair: Address,
    pub token_amount: U256,
    pub native_amount: U256,
}

#[derive(Debug, Clone)]
pub struct MockDexRouter {
    pub factory: Address,
    pub wrapped_native: Address,
    positions: Vec<LiquidityPosition>,
}

impl MockDexRouter {
    pub fn new(factory: Address, wrapped_native: Address) -> Self {
        Self {
            factory,
            wrapped_native,
            positions: Vec::new(),
        }
    }

    pub fn record(&mut self, position: LiquidityPosition) {
        self.positions.push(position);
    }

    pub fn positions(&self) -> &[LiquidityPosition] {
        &self.positions
    }
}

fn sort_tokens(token_a: Address, token_b: Address) -> (Address, Address) {
    if token_a < token_b {
        (token_a, token_b)
    } else {
        (token_b, token_a)
    }
}
