use crate::error::ChainError;

/// Errors for the simulated ERC-20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TokenError {
    InsufficientBalance = 1,
    InsufficientAllowance = 2,
    Unauthorized = 3,
    Overflow = 4,
}

impl TokenError {
    pub fn reason(self) -> &'static str {
        match self {
            TokenError::InsufficientBalance => "ERC20: transfer amount exceeds balance",
            TokenError::InsufficientAllowance => "ERC20: insufficient allowance",
            TokenError::Unauthorized => "Ownable: caller is not the owner",
            TokenError::Overflow => "ERC20: arithmetic overflow",
        }
    }
}

impl From<TokenError> for ChainError {
    fn from(error: TokenError) -> Self {
        ChainError::revert(error.reason())
    }
}

/// Errors for the simulated bonding curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum CurveError {
    CurveAlreadyGraduated = 1,
    MarketCapNotReached = 2,
    InvalidAmount = 3,
    InsufficientTokens = 4,
    InsufficientLiquidity = 5,
    InvalidRouter = 6,
}

impl CurveError {
    pub fn reason(self) -> &'static str {
        match self {
            CurveError::CurveAlreadyGraduated => "Curve graduated",
            CurveError::MarketCapNotReached => "Market cap not reached",
            CurveError::InvalidAmount => "Invalid amount",
            CurveError::InsufficientTokens => "Insufficient tokens",
            CurveError::InsufficientLiquidity => "Insufficient liquidity",
            CurveError::InvalidRouter => "Invalid router",
        }
    }
}

impl From<CurveError> for ChainError {
    fn from(error: CurveError) -> Self {
        ChainError::revert(error.reason())
    }
}

/// Errors for the simulated token factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FactoryError {
    IncorrectLaunchFee = 1,
    Unauthorized = 2,
    NoFeesToWithdraw = 3,
    InvalidGraduationMarketCap = 4,
}

impl FactoryError {
    pub fn reason(self) -> &'static str {
        match self {
            FactoryError::IncorrectLaunchFee => "Incorrect launch fee",
            FactoryError::Unauthorized => "Only owner",
            FactoryError::NoFeesToWithdraw => "No fees to withdraw",
            FactoryError::InvalidGraduationMarketCap => "Invalid graduation market cap",
        }
    }
}

impl From<FactoryError> for ChainError {
    fn from(error: FactoryError) -> Self {
        ChainError::revert(error.reason())
    }
}

/// Errors for the simulated DEX factory and router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DexError {
    IdenticalAddresses = 1,
    PairExists = 2,
}

impl DexError {
    pub fn reason(self) -> &'static str {
        match self {
            DexError::IdenticalAddresses => "IDENTICAL_ADDRESSES",
            DexError::PairExists => "PAIR_EXISTS",
        }
    }
}

impl From<DexError> for ChainError {
    fn from(error: DexError) -> Self {
        ChainError::revert(error.reason())
    }
}
