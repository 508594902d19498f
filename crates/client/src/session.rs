//! User-facing state: wallet, selected token, trade amount and the launch
//! form.

use ethers::types::{Address, U256};
use serde::Serialize;

use crate::amount::parse_native;
use crate::error::ChainError;
use crate::registry::LaunchedToken;

pub const DEFAULT_METADATA_URI: &str = "https://example.com/metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

/// One trade as the user asked for it. Buys spend `amount` native units;
/// sells return `amount` tokens to the curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeIntent {
    pub token: Address,
    pub curve: Address,
    pub amount: U256,
    pub direction: TradeDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletSession {
    account: Option<Address>,
}

impl WalletSession {
    pub fn connect(&mut self, account: Address) {
        self.account = Some(account);
    }

    pub fn disconnect(&mut self) {
        self.account = None;
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

/// Selection, pending amount and the outcome of the last action.
///
/// The selected token is held by address; its details are always looked
/// up in the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeSession {
    selected: Option<Address>,
    trade_amount: String,
    loading: bool,
    error: Option<String>,
    notice: Option<String>,
}

impl TradeSession {
    pub fn select(&mut self, token: Address) {
        self.selected = Some(token);
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<Address> {
        self.selected
    }

    pub fn selected_token<'a>(&self, tokens: &'a [LaunchedToken]) -> Option<&'a LaunchedToken> {
        let selected = self.selected?;
        tokens.iter().find(|token| token.address == selected)
    }

    pub fn set_trade_amount(&mut self, amount: impl Into<String>) {
        self.trade_amount = amount.into();
    }

    pub fn trade_amount(&self) -> &str {
        &self.trade_amount
    }

    pub fn has_trade_amount(&self) -> bool {
        !self.trade_amount.trim().is_empty()
    }

    pub fn trade_intent(
        &self,
        token: &LaunchedToken,
        direction: TradeDirection,
    ) -> Result<TradeIntent, ChainError> {
        Ok(TradeIntent {
            token: token.address,
            curve: token.curve_address,
            amount: parse_native(&self.trade_amount)?,
            direction,
        })
    }

    /// Start an action: clears the previous outcome.
    pub fn begin(&mut self) {
        self.loading = true;
        self.error = None;
        self.notice = None;
    }

    pub fn succeed(&mut self, notice: impl Into<String>) {
        self.loading = false;
        self.notice = Some(notice.into());
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.loading = false;
        self.error = Some(message.into());
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }
}

/// Launch parameters after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub graduation_market_cap: U256,
}

/// Launch form as typed. The market cap is kept as the user's native-unit
/// string until submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchForm {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub graduation_market_cap: String,
}

impl Default for LaunchForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            symbol: String::new(),
            uri: DEFAULT_METADATA_URI.to_string(),
            graduation_market_cap: String::new(),
        }
    }
}

impl LaunchForm {
    pub fn validate(&self) -> Result<LaunchRequest, ChainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ChainError::validation("token name is required"));
        }
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(ChainError::validation("token symbol is required"));
        }
        let graduation_market_cap = parse_native(&self.graduation_market_cap)
            .map_err(|e| ChainError::validation(format!("graduation market cap: {e}")))?;
        Ok(LaunchRequest {
            name: name.to_string(),
            symbol: symbol.to_string(),
            uri: self.uri.trim().to_string(),
            graduation_market_cap,
        })
    }

    /// Back to the empty form, default URI included.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
