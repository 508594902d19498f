//! In-process simulated chain.
//!
//! Models the launchpad contracts (token factory, bonding curves, launched
//! tokens, wrapped native token and the mock DEX) closely enough to drive the
//! client end to end without a node. Transactions are dry-run when sent, the
//! way a node estimates gas, and executed against live state when their
//! confirmation is awaited.

mod curve;
mod dex;
mod error;
mod factory;
mod state;
mod token;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ethers::abi::{Function, Token};
use ethers::types::{Address, TxHash, U256};
use ethers::utils::keccak256;
use tracing::{debug, info, warn};

pub use self::curve::BondingCurve;
pub use self::dex::{LiquidityPosition, MockDexFactory, MockDexRouter};
pub use self::error::{CurveError, DexError, FactoryError, TokenError};
pub use self::factory::{TokenFactory, TokenInfo};
pub use self::state::{ChainState, Contract, WRAPPED_NATIVE};
pub use self::token::Erc20;

use crate::abi;
use crate::chain::{ChainClient, Receipt, TxHandle};
use crate::config::{ConfirmationPolicy, ContractAddresses, NativeCurrency, NetworkConfig};
use crate::deploy::{deploy_stack, ContractDeployer, DeployedContracts};
use crate::error::{ChainError, DeployError};

pub const DEVNET_CHAIN_ID: u64 = 31337;

// 0.01 and 0.2 native units
const LAUNCH_FEE_WEI: u64 = 10_000_000_000_000_000;
const LAUNCH_APPROVAL_WEI: u64 = 200_000_000_000_000_000;

/// What happened to each transaction, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Deployed { contract: String, address: Address },
    Sent { hash: TxHash, method: String },
    Confirmed { hash: TxHash, method: String },
    Reverted { hash: TxHash, method: String, reason: String },
    Dropped { hash: TxHash, method: String },
}

impl JournalEntry {
    pub fn method(&self) -> &str {
        match self {
            JournalEntry::Deployed { contract, .. } => contract,
            JournalEntry::Sent { method, .. }
            | JournalEntry::Confirmed { method, .. }
            | JournalEntry::Reverted { method, .. }
            | JournalEntry::Dropped { method, .. } => method,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingTx {
    from: Address,
    to: Address,
    value: U256,
    method: String,
    args: Vec<Token>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_reads: HashSet<Address>,
    reject_next_signature: bool,
    drop_next_confirmation: bool,
}

#[derive(Debug, Default)]
struct Inner {
    state: ChainState,
    pending: HashMap<TxHash, PendingTx>,
    receipts: HashMap<TxHash, Receipt>,
    journal: Vec<JournalEntry>,
    faults: Faults,
    tx_count: u64,
}

impl Inner {
    /// Run `f` against a copy of the state and commit it on success.
    fn commit<T>(
        &mut self,
        f: impl FnOnce(&mut ChainState) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let mut next = self.state.clone();
        let output = f(&mut next)?;
        next.block += 1;
        self.state = next;
        Ok(output)
    }
}

/// Handle on a simulated chain, bound to at most one signer. Clones and
/// [`Devnet::connect`] share the same chain.
#[derive(Debug, Clone, Default)]
pub struct Devnet {
    inner: Arc<Mutex<Inner>>,
    signer: Option<Address>,
}

impl Devnet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Same chain, signing as `account`.
    pub fn connect(&self, account: Address) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            signer: Some(account),
        }
    }

    /// Same chain, no wallet.
    pub fn disconnect(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            signer: None,
        }
    }

    pub fn fund(&self, account: Address, amount: U256) {
        self.lock().state.fund(account, amount);
    }

    /// Inspect the current state.
    pub fn with_state<R>(&self, f: impl FnOnce(&ChainState) -> R) -> R {
        f(&self.lock().state)
    }

    pub fn block_number(&self) -> u64 {
        self.lock().state.block
    }

    pub fn token_balance(&self, token: Address, account: Address) -> Result<U256, ChainError> {
        self.with_state(|state| Ok(state.token(token)?.balance_of(account)))
    }

    pub fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.with_state(|state| Ok(state.token(token)?.allowance(owner, spender)))
    }

    pub fn token_info(&self, factory: Address, token: Address) -> Option<TokenInfo> {
        self.with_state(|state| {
            state
                .factory(factory)
                .ok()
                .and_then(|factory| factory.token_info(token).cloned())
        })
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.lock().journal.clone()
    }

    /// Reads of `address` (views and balance) fail with a connection error.
    pub fn fail_reads_from(&self, address: Address) {
        self.lock().faults.failing_reads.insert(address);
    }

    pub fn restore_reads_from(&self, address: Address) {
        self.lock().faults.failing_reads.remove(&address);
    }

    /// The next signature request is declined.
    pub fn reject_next_signature(&self) {
        self.lock().faults.reject_next_signature = true;
    }

    /// The next awaited transaction is dropped from the pool.
    pub fn drop_next_confirmation(&self) {
        self.lock().faults.drop_next_confirmation = true;
    }

    /// Deploy a wrapped native token and the launchpad stack from the
    /// connected signer, returning a config that points at them.
    pub async fn bootstrap(&self) -> Result<(NetworkConfig, DeployedContracts), DeployError> {
        let wrapped_native = self
            .deploy(WRAPPED_NATIVE, Vec::new())
            .await
            .map_err(|source| DeployError {
                contract: WRAPPED_NATIVE.to_string(),
                source,
            })?;
        let deployed = deploy_stack(self, wrapped_native).await?;
        let config = devnet_config(wrapped_native, &deployed);
        Ok((config, deployed))
    }

    /// Wrap `amount` native units into the wrapped native token.
    pub async fn wrap(&self, wrapped_native: Address, amount: U256) -> Result<Receipt, ChainError> {
        let deposit = abi::function(abi::wrapped_native(), abi::DEPOSIT)?;
        let tx = self
            .send_transaction(wrapped_native, deposit, &[], Some(amount))
            .await?;
        self.await_confirmation(&tx).await
    }

    fn require_signer(&self) -> Result<Address, ChainError> {
        self.signer
            .ok_or_else(|| ChainError::Connection("no wallet connected".into()))
    }
}

/// Network config pointing at contracts deployed on a devnet.
pub fn devnet_config(wrapped_native: Address, deployed: &DeployedContracts) -> NetworkConfig {
    NetworkConfig {
        name: "Devnet".to_string(),
        chain_id: DEVNET_CHAIN_ID,
        rpc_url: "http://127.0.0.1:8545".to_string(),
        native_currency: NativeCurrency {
            name: "Monad".to_string(),
            symbol: "MON".to_string(),
            decimals: 18,
        },
        explorer_url: None,
        contracts: ContractAddresses {
            token_factory: deployed.token_factory,
            wrapped_native,
            dex_router: Some(deployed.dex_router),
        },
        launch_fee: U256::from(LAUNCH_FEE_WEI),
        launch_approval: U256::from(LAUNCH_APPROVAL_WEI),
        confirmation: ConfirmationPolicy::default(),
    }
}

fn tx_hash(from: Address, count: u64) -> TxHash {
    let encoded = ethers::abi::encode(&[Token::Address(from), Token::Uint(count.into())]);
    TxHash::from(keccak256(encoded))
}

impl ChainClient for Devnet {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        tokio::task::yield_now().await;
        let inner = self.lock();
        if inner.faults.failing_reads.contains(&account) {
            return Err(ChainError::Connection(format!("eth_getBalance {account:?} failed")));
        }
        Ok(inner.state.native_balance(account))
    }

    async fn call_view(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError> {
        tokio::task::yield_now().await;
        let inner = self.lock();
        if inner.faults.failing_reads.contains(&contract) {
            return Err(ChainError::Connection(format!(
                "eth_call {}@{contract:?} failed",
                function.name
            )));
        }
        inner.state.view(contract, &function.name, args)
    }

    async fn send_transaction(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
        value: Option<U256>,
    ) -> Result<TxHandle, ChainError> {
        let from = self.require_signer()?;
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        if std::mem::take(&mut inner.faults.reject_next_signature) {
            warn!(function = %function.name, "signature declined");
            return Err(ChainError::UserRejected);
        }

        let tx = PendingTx {
            from,
            to: contract,
            value: value.unwrap_or_default(),
            method: function.name.clone(),
            args: args.to_vec(),
        };
        inner
            .state
            .clone()
            .execute(tx.from, tx.to, tx.value, &tx.method, &tx.args)?;

        inner.tx_count += 1;
        let hash = tx_hash(from, inner.tx_count);
        debug!(tx = ?hash, function = %tx.method, "transaction queued");
        inner.journal.push(JournalEntry::Sent {
            hash,
            method: tx.method.clone(),
        });
        inner.pending.insert(hash, tx);
        Ok(TxHandle::new(hash))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, ChainError> {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        let Some(pending) = inner.pending.remove(&tx.hash) else {
            return inner
                .receipts
                .get(&tx.hash)
                .cloned()
                .ok_or(ChainError::Timeout(tx.hash));
        };

        if std::mem::take(&mut inner.faults.drop_next_confirmation) {
            warn!(tx = ?tx.hash, "transaction dropped");
            inner.journal.push(JournalEntry::Dropped {
                hash: tx.hash,
                method: pending.method,
            });
            return Err(ChainError::Timeout(tx.hash));
        }

        let outcome = inner.commit(|state| {
            state.execute(
                pending.from,
                pending.to,
                pending.value,
                &pending.method,
                &pending.args,
            )
        });
        match outcome {
            Ok(_) => {
                let receipt = Receipt {
                    tx_hash: tx.hash,
                    block_number: inner.state.block,
                    contract_address: None,
                };
                info!(tx = ?tx.hash, block = receipt.block_number, function = %pending.method, "transaction confirmed");
                inner.journal.push(JournalEntry::Confirmed {
                    hash: tx.hash,
                    method: pending.method,
                });
                inner.receipts.insert(tx.hash, receipt.clone());
                Ok(receipt)
            }
            Err(err) => {
                warn!(tx = ?tx.hash, error = %err, "transaction reverted");
                inner.journal.push(JournalEntry::Reverted {
                    hash: tx.hash,
                    method: pending.method,
                    reason: err.revert_reason().unwrap_or_default().to_string(),
                });
                Err(err)
            }
        }
    }
}

impl ContractDeployer for Devnet {
    fn deployer(&self) -> Option<Address> {
        self.signer
    }

    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address, ChainError> {
        let from = self.require_signer()?;
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        let address = inner.commit(|state| state.deploy(from, contract, &args))?;
        inner.journal.push(JournalEntry::Deployed {
            contract: contract.to_string(),
            address,
        });
        Ok(address)
    }
}
