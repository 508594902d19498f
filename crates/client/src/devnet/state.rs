use std::collections::HashMap;

use ethers::abi::Token;
use ethers::types::{Address, U256};
use ethers::utils::get_contract_address;

use super::curve::BondingCurve;
use super::dex::{LiquidityPosition, MockDexFactory, MockDexRouter};
use super::error::{CurveError, FactoryError};
use super::factory::{TokenFactory, TokenInfo};
use super::token::Erc20;
use crate::abi;
use crate::deploy::{DEX_FACTORY, DEX_ROUTER, TOKEN_FACTORY};
use crate::error::ChainError;

/// Contract name the devnet deploys its wrapped native token under.
pub const WRAPPED_NATIVE: &str = "WrappedNative";

#[derive(Debug, Clone)]
pub enum Contract {
    Token(Erc20),
    WrappedNative(Erc20),
    Curve(BondingCurve),
    Factory(TokenFactory),
    DexFactory(MockDexFactory),
    DexRouter(MockDexRouter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Token,
    WrappedNative,
    Curve,
    Factory,
    DexFactory,
    DexRouter,
}

impl Contract {
    fn kind(&self) -> Kind {
        match self {
            Contract::Token(_) => Kind::Token,
            Contract::WrappedNative(_) => Kind::WrappedNative,
            Contract::Curve(_) => Kind::Curve,
            Contract::Factory(_) => Kind::Factory,
            Contract::DexFactory(_) => Kind::DexFactory,
            Contract::DexRouter(_) => Kind::DexRouter,
        }
    }
}

/// World state of the simulated chain. `execute` is not atomic: callers
/// run it on a clone and keep the clone only on success.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    pub block: u64,
    native: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, Contract>,
}

impl ChainState {
    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    pub fn fund(&mut self, account: Address, amount: U256) {
        let balance = self.native_balance(account);
        self.native.insert(account, balance.saturating_add(amount));
    }

    fn move_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = self.native_balance(from);
        if balance < amount {
            return Err(ChainError::revert("insufficient funds for transfer"));
        }
        self.native.insert(from, balance - amount);
        self.fund(to, amount);
        Ok(())
    }

    /// CREATE address for the next contract `sender` deploys.
    fn next_address(&mut self, sender: Address) -> Address {
        let nonce = self.nonces.entry(sender).or_default();
        let address = get_contract_address(sender, *nonce);
        *nonce += 1;
        address
    }

    pub fn contract(&self, address: Address) -> Result<&Contract, ChainError> {
        self.contracts
            .get(&address)
            .ok_or_else(|| ChainError::Decode(format!("no contract at {address:?}")))
    }

    pub fn token(&self, address: Address) -> Result<&Erc20, ChainError> {
        match self.contract(address)? {
            Contract::Token(token) | Contract::WrappedNative(token) => Ok(token),
            _ => Err(not_a(address, "token")),
        }
    }

    fn token_mut(&mut self, address: Address) -> Result<&mut Erc20, ChainError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Token(token)) | Some(Contract::WrappedNative(token)) => Ok(token),
            _ => Err(not_a(address, "token")),
        }
    }

    pub fn curve(&self, address: Address) -> Result<&BondingCurve, ChainError> {
        match self.contract(address)? {
            Contract::Curve(curve) => Ok(curve),
            _ => Err(not_a(address, "bonding curve")),
        }
    }

    fn curve_mut(&mut self, address: Address) -> Result<&mut BondingCurve, ChainError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Curve(curve)) => Ok(curve),
            _ => Err(not_a(address, "bonding curve")),
        }
    }

    pub fn factory(&self, address: Address) -> Result<&TokenFactory, ChainError> {
        match self.contract(address)? {
            Contract::Factory(factory) => Ok(factory),
            _ => Err(not_a(address, "token factory")),
        }
    }

    fn factory_mut(&mut self, address: Address) -> Result<&mut TokenFactory, ChainError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::Factory(factory)) => Ok(factory),
            _ => Err(not_a(address, "token factory")),
        }
    }

    pub fn dex_factory(&self, address: Address) -> Result<&MockDexFactory, ChainError> {
        match self.contract(address)? {
            Contract::DexFactory(factory) => Ok(factory),
            _ => Err(not_a(address, "dex factory")),
        }
    }

    fn dex_factory_mut(&mut self, address: Address) -> Result<&mut MockDexFactory, ChainError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::DexFactory(factory)) => Ok(factory),
            _ => Err(not_a(address, "dex factory")),
        }
    }

    pub fn router(&self, address: Address) -> Result<&MockDexRouter, ChainError> {
        match self.contract(address)? {
            Contract::DexRouter(router) => Ok(router),
            _ => Err(not_a(address, "dex router")),
        }
    }

    fn router_mut(&mut self, address: Address) -> Result<&mut MockDexRouter, ChainError> {
        match self.contracts.get_mut(&address) {
            Some(Contract::DexRouter(router)) => Ok(router),
            _ => Err(not_a(address, "dex router")),
        }
    }

    /// Create `contract` from `deployer` with constructor `args`.
    pub fn deploy(
        &mut self,
        deployer: Address,
        contract: &str,
        args: &[Token],
    ) -> Result<Address, ChainError> {
        let deployed = match contract {
            WRAPPED_NATIVE => {
                Contract::WrappedNative(Erc20::new("Wrapped Monad", "WMON", Address::zero()))
            }
            DEX_FACTORY => Contract::DexFactory(MockDexFactory::new(arg_address(args, 0)?)),
            DEX_ROUTER => Contract::DexRouter(MockDexRouter::new(
                arg_address(args, 0)?,
                arg_address(args, 1)?,
            )),
            TOKEN_FACTORY => Contract::Factory(TokenFactory::new(
                deployer,
                arg_address(args, 0)?,
                arg_address(args, 1)?,
                arg_address(args, 2)?,
            )),
            other => return Err(ChainError::validation(format!("unknown contract {other}"))),
        };
        let address = self.next_address(deployer);
        self.contracts.insert(address, deployed);
        Ok(address)
    }

    /// Read-only dispatch.
    pub fn view(&self, to: Address, method: &str, args: &[Token]) -> Result<Vec<Token>, ChainError> {
        let output = match (self.contract(to)?, method) {
            (Contract::Token(token) | Contract::WrappedNative(token), abi::NAME) => {
                Token::String(token.name.clone())
            }
            (Contract::Token(token) | Contract::WrappedNative(token), abi::SYMBOL) => {
                Token::String(token.symbol.clone())
            }
            (Contract::Token(token) | Contract::WrappedNative(token), abi::OWNER) => {
                Token::Address(token.owner)
            }
            (Contract::Token(token) | Contract::WrappedNative(token), abi::BALANCE_OF) => {
                Token::Uint(token.balance_of(arg_address(args, 0)?))
            }
            (Contract::Curve(curve), abi::IS_GRADUATED) => Token::Bool(curve.graduated),
            (Contract::Factory(factory), abi::GET_LAUNCHED_TOKENS) => Token::Array(
                factory
                    .launched_tokens()
                    .iter()
                    .copied()
                    .map(Token::Address)
                    .collect(),
            ),
            _ => return Err(unrecognized(method)),
        };
        Ok(vec![output])
    }

    /// State-changing dispatch. `value` moves to `to` before the call runs.
    pub fn execute(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        method: &str,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError> {
        let kind = self.contract(to)?.kind();
        if !value.is_zero() {
            if !matches!(method, abi::BUY | abi::DEPOSIT | abi::LAUNCH_NEW_TOKEN) {
                return Err(ChainError::revert("function is not payable"));
            }
            self.move_native(caller, to, value)?;
        }

        match (kind, method) {
            (Kind::Token | Kind::WrappedNative, abi::APPROVE) => {
                let spender = arg_address(args, 0)?;
                let amount = arg_uint(args, 1)?;
                self.token_mut(to)?.approve(caller, spender, amount);
                Ok(vec![Token::Bool(true)])
            }
            (Kind::WrappedNative, abi::DEPOSIT) => {
                self.token_mut(to)?.credit(caller, value)?;
                Ok(vec![])
            }
            (Kind::WrappedNative, abi::WITHDRAW) => {
                let amount = arg_uint(args, 0)?;
                self.token_mut(to)?.debit(caller, amount)?;
                self.move_native(to, caller, amount)?;
                Ok(vec![])
            }
            (Kind::Curve, abi::BUY) => self.buy(to, caller, value),
            (Kind::Curve, abi::SELL) => self.sell(to, caller, arg_uint(args, 0)?),
            (Kind::Curve, abi::GRADUATE) => self.graduate(to, arg_address(args, 0)?),
            (Kind::Factory, abi::LAUNCH_NEW_TOKEN) => self.launch(to, caller, value, args),
            (Kind::Factory, abi::WITHDRAW_FEES) => {
                self.withdraw_fees(to, caller, arg_address(args, 0)?)
            }
            _ => Err(unrecognized(method)),
        }
    }

    fn launch(
        &mut self,
        factory_address: Address,
        creator: Address,
        value: U256,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError> {
        let name = arg_string(args, 0)?;
        let symbol = arg_string(args, 1)?;
        let uri = arg_string(args, 2)?;
        let graduation_market_cap = arg_uint(args, 3)?;

        let factory = self.factory(factory_address)?;
        let (fee, wrapped_native) = (factory.launch_fee, factory.wrapped_native);
        if value.is_zero() {
            // No value attached: the fee is pulled from the wrapped native allowance.
            self.token_mut(wrapped_native)?
                .transfer_from(factory_address, creator, factory_address, fee)
                .map_err(|_| FactoryError::IncorrectLaunchFee)?;
        } else {
            self.factory(factory_address)?.check_paid_fee(value)?;
        }
        if graduation_market_cap.is_zero() {
            return Err(FactoryError::InvalidGraduationMarketCap.into());
        }

        let token = self.next_address(factory_address);
        let curve = self.next_address(factory_address);
        self.contracts
            .insert(token, Contract::Token(Erc20::new(name.clone(), symbol.clone(), curve)));
        self.contracts.insert(
            curve,
            Contract::Curve(BondingCurve::new(token, creator, graduation_market_cap)),
        );
        self.factory_mut(factory_address)?.record_launch(TokenInfo {
            token,
            curve,
            creator,
            name,
            symbol,
            uri,
            graduation_market_cap,
        });
        Ok(vec![])
    }

    fn withdraw_fees(
        &mut self,
        factory_address: Address,
        caller: Address,
        to: Address,
    ) -> Result<Vec<Token>, ChainError> {
        let factory = self.factory(factory_address)?;
        factory.require_owner(caller)?;
        let wrapped_native = factory.wrapped_native;

        let native = self.native_balance(factory_address);
        let wrapped = self.token(wrapped_native)?.balance_of(factory_address);
        if native.is_zero() && wrapped.is_zero() {
            return Err(FactoryError::NoFeesToWithdraw.into());
        }
        self.move_native(factory_address, to, native)?;
        if !wrapped.is_zero() {
            self.token_mut(wrapped_native)?
                .transfer(factory_address, to, wrapped)?;
        }
        Ok(vec![])
    }

    fn buy(&mut self, curve_address: Address, buyer: Address, value: U256) -> Result<Vec<Token>, ChainError> {
        let curve = self.curve(curve_address)?;
        curve.require_active()?;
        let tokens = curve.quote_buy(value)?;
        let token = curve.token;

        self.token_mut(token)?.mint(curve_address, buyer, tokens)?;
        self.curve_mut(curve_address)?.tokens_sold += tokens;
        Ok(vec![])
    }

    fn sell(&mut self, curve_address: Address, seller: Address, amount: U256) -> Result<Vec<Token>, ChainError> {
        let curve = self.curve(curve_address)?;
        curve.require_active()?;
        let payout = curve.quote_sell(amount)?;
        let token = curve.token;
        if self.native_balance(curve_address) < payout {
            return Err(CurveError::InsufficientLiquidity.into());
        }

        let erc20 = self.token_mut(token)?;
        erc20.transfer_from(curve_address, seller, curve_address, amount)?;
        erc20.burn(curve_address, curve_address, amount)?;
        self.curve_mut(curve_address)?.tokens_sold -= amount;
        self.move_native(curve_address, seller, payout)?;
        Ok(vec![])
    }

    /// Close the curve and seed a DEX pair with its reserves.
    fn graduate(&mut self, curve_address: Address, router_address: Address) -> Result<Vec<Token>, ChainError> {
        let curve = self.curve(curve_address)?;
        curve.require_active()?;
        let (token, market_cap) = (curve.token, curve.graduation_market_cap);

        let (dex_factory, wrapped_native) = match self.contracts.get(&router_address) {
            Some(Contract::DexRouter(router)) => (router.factory, router.wrapped_native),
            _ => return Err(CurveError::InvalidRouter.into()),
        };
        let liquidity = self.native_balance(curve_address);
        if liquidity < market_cap {
            return Err(CurveError::MarketCapNotReached.into());
        }

        let pair = self.next_address(dex_factory);
        self.dex_factory_mut(dex_factory)?
            .create_pair(token, wrapped_native, pair)?;

        let curve = self.curve_mut(curve_address)?;
        curve.graduated = true;
        curve.pair = Some(pair);
        let remaining = curve.remaining();

        self.token_mut(token)?.mint(curve_address, pair, remaining)?;
        self.move_native(curve_address, pair, liquidity)?;
        self.router_mut(router_address)?.record(LiquidityPosition {
            token,
            pair,
            token_amount: remaining,
            native_amount: liquidity,
        });
        Ok(vec![])
    }
}

fn not_a(address: Address, what: &str) -> ChainError {
    ChainError::Decode(format!("{address:?} is not a {what}"))
}

fn unrecognized(method: &str) -> ChainError {
    ChainError::revert(format!("function selector was not recognized: {method}"))
}

fn arg(args: &[Token], index: usize) -> Result<Token, ChainError> {
    args.get(index)
        .cloned()
        .ok_or_else(|| ChainError::validation(format!("missing argument {index}")))
}

fn arg_address(args: &[Token], index: usize) -> Result<Address, ChainError> {
    arg(args, index)?
        .into_address()
        .ok_or_else(|| ChainError::validation(format!("argument {index} is not an address")))
}

fn arg_uint(args: &[Token], index: usize) -> Result<U256, ChainError> {
    arg(args, index)?
        .into_uint()
        .ok_or_else(|| ChainError::validation(format!("argument {index} is not a uint256")))
}

fn arg_string(args: &[Token], index: usize) -> Result<String, ChainError> {
    arg(args, index)?
        .into_string()
        .ok_or_else(|| ChainError::validation(format!("argument {index} is not a string")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Address = Address::repeat_byte(0x01);
    const ALICE: Address = Address::repeat_byte(0x0a);

    fn ether(n: u64) -> U256 {
        U256::exp10(18) * n
    }

    fn fee() -> U256 {
        U256::exp10(16)
    }

    struct Stack {
        state: ChainState,
        wmon: Address,
        router: Address,
        factory: Address,
    }

    fn stack() -> Stack {
        let mut state = ChainState::default();
        state.fund(OWNER, ether(100));
        state.fund(ALICE, ether(100));
        let wmon = state.deploy(OWNER, WRAPPED_NATIVE, &[]).unwrap();
        let dex_factory = state
            .deploy(OWNER, DEX_FACTORY, &[Token::Address(wmon)])
            .unwrap();
        let router = state
            .deploy(
                OWNER,
                DEX_ROUTER,
                &[Token::Address(dex_factory), Token::Address(wmon)],
            )
            .unwrap();
        let factory = state
            .deploy(
                OWNER,
                TOKEN_FACTORY,
                &[
                    Token::Address(dex_factory),
                    Token::Address(router),
                    Token::Address(wmon),
                ],
            )
            .unwrap();
        Stack {
            state,
            wmon,
            router,
            factory,
        }
    }

    fn launch_args(name: &str, symbol: &str, cap: U256) -> Vec<Token> {
        vec![
            Token::String(name.into()),
            Token::String(symbol.into()),
            Token::String("https://example.com/metadata.json".into()),
            Token::Uint(cap),
        ]
    }

    /// Launch "My Token" from ALICE paying the fee as value; returns (token, curve).
    fn launch(stack: &mut Stack, cap: U256) -> (Address, Address) {
        stack
            .state
            .execute(ALICE, stack.factory, fee(), abi::LAUNCH_NEW_TOKEN, &launch_args("My Token", "MTK", cap))
            .unwrap();
        let factory = stack.state.factory(stack.factory).unwrap();
        let token = *factory.launched_tokens().last().unwrap();
        (token, factory.token_info(token).unwrap().curve)
    }

    #[test]
    fn test_launch_with_exact_fee_records_metadata() {
        let mut stack = stack();
        let (token, curve) = launch(&mut stack, ether(1));

        let info = stack.state.factory(stack.factory).unwrap().token_info(token).unwrap();
        assert_eq!(info.name, "My Token");
        assert_eq!(info.symbol, "MTK");
        assert_eq!(info.creator, ALICE);
        assert_eq!(stack.state.token(token).unwrap().owner, curve);
        assert_eq!(stack.state.native_balance(stack.factory), fee());
    }

    #[test]
    fn test_launch_with_wrong_fee_reverts() {
        let stack = stack();
        let args = launch_args("Another Token", "ATK", ether(1));
        for value in [U256::zero(), fee() - 1] {
            let err = stack
                .state
                .clone()
                .execute(ALICE, stack.factory, value, abi::LAUNCH_NEW_TOKEN, &args)
                .unwrap_err();
            assert_eq!(err.revert_reason(), Some("Incorrect launch fee"));
        }
    }

    #[test]
    fn test_launch_pulls_fee_from_wrapped_allowance() {
        let mut stack = stack();
        let state = &mut stack.state;
        state.execute(ALICE, stack.wmon, ether(1), abi::DEPOSIT, &[]).unwrap();
        state
            .execute(
                ALICE,
                stack.wmon,
                U256::zero(),
                abi::APPROVE,
                &[Token::Address(stack.factory), Token::Uint(ether(1) / 5)],
            )
            .unwrap();
        state
            .execute(ALICE, stack.factory, U256::zero(), abi::LAUNCH_NEW_TOKEN, &launch_args("My Token", "MTK", ether(1)))
            .unwrap();

        let wmon = state.token(stack.wmon).unwrap();
        assert_eq!(wmon.balance_of(stack.factory), fee());
        assert_eq!(wmon.allowance(ALICE, stack.factory), ether(1) / 5 - fee());
    }

    #[test]
    fn test_buy_then_sell() {
        let mut stack = stack();
        let (token, curve) = launch(&mut stack, ether(1));
        let spent = fee();
        stack.state.execute(ALICE, curve, spent, abi::BUY, &[]).unwrap();
        let bought = stack.state.token(token).unwrap().balance_of(ALICE);
        assert!(!bought.is_zero());

        let err = stack
            .state
            .clone()
            .execute(ALICE, curve, U256::zero(), abi::SELL, &[Token::Uint(bought)])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("ERC20: insufficient allowance"));

        let before = stack.state.native_balance(ALICE);
        stack
            .state
            .execute(ALICE, token, U256::zero(), abi::APPROVE, &[Token::Address(curve), Token::Uint(bought)])
            .unwrap();
        stack
            .state
            .execute(ALICE, curve, U256::zero(), abi::SELL, &[Token::Uint(bought)])
            .unwrap();
        let received = stack.state.native_balance(ALICE) - before;
        assert!(received <= spent);
        assert!(stack.state.token(token).unwrap().balance_of(ALICE).is_zero());
    }

    #[test]
    fn test_graduate_requires_market_cap() {
        let mut stack = stack();
        let (_, curve) = launch(&mut stack, ether(10));
        stack.state.execute(ALICE, curve, fee(), abi::BUY, &[]).unwrap();

        let err = stack
            .state
            .execute(ALICE, curve, U256::zero(), abi::GRADUATE, &[Token::Address(stack.router)])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Market cap not reached"));
        assert!(!stack.state.curve(curve).unwrap().graduated);
    }

    #[test]
    fn test_graduate_seeds_pair_and_closes_curve() {
        let mut stack = stack();
        let cap = ether(1) / 20;
        let (token, curve) = launch(&mut stack, cap);
        stack.state.execute(ALICE, curve, ether(1) / 10, abi::BUY, &[]).unwrap();

        let err = stack
            .state
            .clone()
            .execute(ALICE, curve, U256::zero(), abi::GRADUATE, &[Token::Address(stack.wmon)])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Invalid router"));

        stack
            .state
            .execute(ALICE, curve, U256::zero(), abi::GRADUATE, &[Token::Address(stack.router)])
            .unwrap();
        assert!(stack.state.curve(curve).unwrap().graduated);

        let positions = stack.state.router(stack.router).unwrap().positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].token, token);
        assert_eq!(positions[0].native_amount, ether(1) / 10);

        let err = stack
            .state
            .execute(ALICE, curve, fee(), abi::BUY, &[])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Curve graduated"));
    }

    #[test]
    fn test_withdraw_fees_is_owner_only() {
        let mut stack = stack();
        let to = Address::repeat_byte(0x0f);
        let err = stack
            .state
            .execute(OWNER, stack.factory, U256::zero(), abi::WITHDRAW_FEES, &[Token::Address(to)])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("No fees to withdraw"));

        launch(&mut stack, ether(1));
        let err = stack
            .state
            .execute(ALICE, stack.factory, U256::zero(), abi::WITHDRAW_FEES, &[Token::Address(to)])
            .unwrap_err();
        assert_eq!(err.revert_reason(), Some("Only owner"));

        stack
            .state
            .execute(OWNER, stack.factory, U256::zero(), abi::WITHDRAW_FEES, &[Token::Address(to)])
            .unwrap();
        assert_eq!(stack.state.native_balance(to), fee());
        assert!(stack.state.native_balance(stack.factory).is_zero());
    }

    #[test]
    fn test_views() {
        let mut stack = stack();
        let (token, curve) = launch(&mut stack, ether(1));
        let state = &stack.state;

        assert_eq!(
            state.view(token, abi::SYMBOL, &[]).unwrap(),
            vec![Token::String("MTK".into())]
        );
        assert_eq!(
            state.view(token, abi::OWNER, &[]).unwrap(),
            vec![Token::Address(curve)]
        );
        assert_eq!(
            state.view(curve, abi::IS_GRADUATED, &[]).unwrap(),
            vec![Token::Bool(false)]
        );
        assert!(state.view(ALICE, abi::NAME, &[]).is_err());
        assert!(state.view(curve, abi::NAME, &[]).is_err());
    }
}
