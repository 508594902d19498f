use ethers::types::{Address, U256};

use super::error::CurveError;

/// Precision multiplier for fixed-point arithmetic (18 decimals)
const PRECISION: u128 = 1_000_000_000_000_000_000u128;

/// One whole token in base units
const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000u128;

// Default curve parameters
const DEFAULT_BASE_PRICE: u64 = 1_000_000_000; // 1 gwei per token
const DEFAULT_MAX_PRICE: u64 = 100_000_000_000; // 100 gwei per token
const DEFAULT_CURVE_SUPPLY_TOKENS: u64 = 1_000_000_000; // 1 billion tokens

/// Bonding curve state for one launched token.
#[derive(Debug, Clone)]
pub struct BondingCurve {
    pub token: Address,
    pub creator: Address,
    pub graduation_market_cap: U256,
    pub total_supply: U256,
    pub tokens_sold: U256,
    pub base_price: U256,
    pub max_price: U256,
    pub graduated: bool,
    pub pair: Option<Address>,
}

impl BondingCurve {
    pub fn new(token: Address, creator: Address, graduation_market_cap: U256) -> Self {
        Self {
            token,
            creator,
            graduation_market_cap,
            total_supply: U256::from(DEFAULT_CURVE_SUPPLY_TOKENS) * U256::from(TOKEN_UNIT),
            tokens_sold: U256::zero(),
            base_price: U256::from(DEFAULT_BASE_PRICE),
            max_price: U256::from(DEFAULT_MAX_PRICE),
            graduated: false,
            pair: None,
        }
    }

    pub fn require_active(&self) -> Result<(), CurveError> {
        if self.graduated {
            return Err(CurveError::CurveAlreadyGraduated);
        }
        Ok(())
    }

    /// Current spot price in wei per whole token.
    pub fn price(&self) -> U256 {
        calculate_price(self.tokens_sold, self.total_supply, self.base_price, self.max_price)
    }

    pub fn remaining(&self) -> U256 {
        self.total_supply - self.tokens_sold
    }

    /// Tokens received for `native_in` wei.
    pub fn quote_buy(&self, native_in: U256) -> Result<U256, CurveError> {
        if native_in.is_zero() {
            return Err(CurveError::InvalidAmount);
        }
        let tokens = calculate_tokens_for_native(
            native_in,
            self.tokens_sold,
            self.total_supply,
            self.base_price,
            self.max_price,
        );
        if tokens.is_zero() {
            return Err(CurveError::InvalidAmount);
        }
        Ok(tokens)
    }

    /// Wei returned for selling `token_amount` back to the curve.
    pub fn quote_sell(&self, token_amount: U256) -> Result<U256, CurveError> {
        if token_amount.is_zero() {
            return Err(CurveError::InvalidAmount);
        }
        if token_amount > self.tokens_sold {
            return Err(CurveError::InsufficientTokens);
        }
        Ok(calculate_native_for_tokens(
            token_amount,
            self.tokens_sold,
            self.total_supply,
            self.base_price,
            self.max_price,
        ))
    }
}

/// Linear curve: price increases linearly from base_price to max_price
/// price = base_price + progress * (max_price - base_price)
pub fn calculate_price(
    tokens_sold: U256,
    total_supply: U256,
    base_price: U256,
    max_price: U256,
) -> U256 {
    if total_supply.is_zero() {
        return base_price;
    }

    let precision = U256::from(PRECISION);
    let progress = (tokens_sold * precision) / total_supply;
    let price_range = max_price - base_price;
    base_price + (progress * price_range) / precision
}

/// Tokens bought with `native_amount`, capped at the remaining supply.
///
/// Priced at the midpoint of the range a spot-price estimate would buy.
/// Selling the result straight back never returns more than `native_amount`.
pub fn calculate_tokens_for_native(
    native_amount: U256,
    current_sold: U256,
    total_supply: U256,
    base_price: U256,
    max_price: U256,
) -> U256 {
    if native_amount.is_zero() || total_supply.is_zero() {
        return U256::zero();
    }

    let remaining = total_supply - current_sold;
    let scaled = native_amount * U256::from(TOKEN_UNIT);

    let spot_price = calculate_price(current_sold, total_supply, base_price, max_price);
    if spot_price.is_zero() {
        return U256::zero();
    }
    let estimate = (scaled / spot_price).min(remaining);

    let mid_price = calculate_price(current_sold + estimate / 2, total_supply, base_price, max_price);
    (scaled / mid_price).min(remaining)
}

/// Wei paid out for `token_amount`, priced at the midpoint of the sell range.
pub fn calculate_native_for_tokens(
    token_amount: U256,
    current_sold: U256,
    total_supply: U256,
    base_price: U256,
    max_price: U256,
) -> U256 {
    if token_amount.is_zero() || current_sold.is_zero() {
        return U256::zero();
    }

    let sell_from = current_sold.saturating_sub(token_amount);
    let avg_sold = (current_sold + sell_from) / 2;
    let avg_price = calculate_price(avg_sold, total_supply, base_price, max_price);

    (token_amount * avg_price) / U256::from(TOKEN_UNIT)
}
