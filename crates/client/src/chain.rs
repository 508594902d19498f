use ethers::abi::{Function, Token};
use ethers::types::{Address, TxHash, U256};
use serde::Serialize;

use crate::error::ChainError;

/// Handle to a submitted, not yet confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TxHandle {
    pub hash: TxHash,
}

impl TxHandle {
    pub fn new(hash: TxHash) -> Self {
        Self { hash }
    }
}

/// Inclusion proof of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub contract_address: Option<Address>,
}

/// Connection to one network through one signer.
///
/// Every call is a suspension point. Nothing is retried: a failed call
/// surfaces to the caller immediately.
#[allow(async_fn_in_trait)]
pub trait ChainClient {
    /// Account transactions are signed with, if a wallet is connected.
    fn signer(&self) -> Option<Address>;

    /// Native balance of `account`.
    async fn balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Read-only call. Never mutates chain state.
    async fn call_view(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError>;

    /// Sign and submit a transaction, attaching `value` native units if given.
    async fn send_transaction(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
        value: Option<U256>,
    ) -> Result<TxHandle, ChainError>;

    /// Wait until `tx` is included.
    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, ChainError>;
}
