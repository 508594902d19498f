//! Contract interfaces consumed by the client.
//!
//! The contracts themselves are deployed separately; only the fragments the
//! client calls are declared here.

use ethers::abi::{Abi, Function, Token};
use ethers::prelude::abigen;
use ethers::types::{Address, U256};

use crate::error::ChainError;

abigen!(
    ITokenFactory,
    r#"[
        function launchNewToken(string name, string symbol, string uri, uint256 graduationMarketCap)
        function getLaunchedTokens() external view returns (address[])
        function withdrawFees(address to)
    ]"#,
);

abigen!(
    IToken,
    r#"[
        function name() external view returns (string)
        function symbol() external view returns (string)
        function owner() external view returns (address)
        function balanceOf(address account) external view returns (uint256)
        function approve(address spender, uint256 amount) external returns (bool)
    ]"#,
);

abigen!(
    IBondingCurve,
    r#"[
        function isGraduated() external view returns (bool)
        function graduate(address dexRouterAddress)
        function buy() external payable
        function sell(uint256 amount)
    ]"#,
);

abigen!(
    IWrappedNative,
    r#"[
        function deposit() external payable
        function withdraw(uint256 amount)
    ]"#,
);

pub const LAUNCH_NEW_TOKEN: &str = "launchNewToken";
pub const GET_LAUNCHED_TOKENS: &str = "getLaunchedTokens";
pub const WITHDRAW_FEES: &str = "withdrawFees";
pub const NAME: &str = "name";
pub const SYMBOL: &str = "symbol";
pub const OWNER: &str = "owner";
pub const BALANCE_OF: &str = "balanceOf";
pub const APPROVE: &str = "approve";
pub const IS_GRADUATED: &str = "isGraduated";
pub const GRADUATE: &str = "graduate";
pub const BUY: &str = "buy";
pub const SELL: &str = "sell";
pub const DEPOSIT: &str = "deposit";
pub const WITHDRAW: &str = "withdraw";

pub fn factory() -> &'static Abi {
    &ITOKENFACTORY_ABI
}

pub fn token() -> &'static Abi {
    &ITOKEN_ABI
}

pub fn curve() -> &'static Abi {
    &IBONDINGCURVE_ABI
}

pub fn wrapped_native() -> &'static Abi {
    &IWRAPPEDNATIVE_ABI
}

/// Look up a fragment by name.
pub fn function(abi: &'static Abi, name: &str) -> Result<&'static Function, ChainError> {
    abi.function(name)
        .map_err(|e| ChainError::Decode(format!("{name}: {e}")))
}

fn single(output: Vec<Token>) -> Result<Token, ChainError> {
    let mut output = output.into_iter();
    match (output.next(), output.next()) {
        (Some(token), None) => Ok(token),
        _ => Err(ChainError::Decode("expected a single return value".into())),
    }
}

pub fn into_string(output: Vec<Token>) -> Result<String, ChainError> {
    single(output)?
        .into_string()
        .ok_or_else(|| ChainError::Decode("expected string".into()))
}

pub fn into_address(output: Vec<Token>) -> Result<Address, ChainError> {
    single(output)?
        .into_address()
        .ok_or_else(|| ChainError::Decode("expected address".into()))
}

pub fn into_bool(output: Vec<Token>) -> Result<bool, ChainError> {
    single(output)?
        .into_bool()
        .ok_or_else(|| ChainError::Decode("expected bool".into()))
}

pub fn into_uint(output: Vec<Token>) -> Result<U256, ChainError> {
    single(output)?
        .into_uint()
        .ok_or_else(|| ChainError::Decode("expected uint256".into()))
}

pub fn into_addresses(output: Vec<Token>) -> Result<Vec<Address>, ChainError> {
    single(output)?
        .into_array()
        .ok_or_else(|| ChainError::Decode("expected address[]".into()))?
        .into_iter()
        .map(|token| {
            token
                .into_address()
                .ok_or_else(|| ChainError::Decode("expected address".into()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragments_resolve() {
        let launch = function(factory(), LAUNCH_NEW_TOKEN).unwrap();
        assert_eq!(launch.inputs.len(), 4);
        assert!(function(curve(), BUY).is_ok());
        assert!(function(token(), APPROVE).is_ok());
        assert!(function(token(), "transfer").is_err());
    }

    #[test]
    fn test_decode_helpers() {
        let addrs = vec![Address::from_low_u64_be(1), Address::from_low_u64_be(2)];
        let out = vec![Token::Array(addrs.iter().copied().map(Token::Address).collect())];
        assert_eq!(into_addresses(out).unwrap(), addrs);

        assert_eq!(into_bool(vec![Token::Bool(true)]).unwrap(), true);
        assert!(into_string(vec![Token::Bool(true)]).is_err());
        assert!(into_uint(vec![]).is_err());
    }
}
