//! JSON-RPC backed chain client and artifact deployer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ethers::abi::{Abi, Function, Token};
use ethers::contract::{ContractError, ContractFactory};
use ethers::middleware::{signer::SignerMiddlewareError, SignerMiddleware};
use ethers::providers::{Http, Middleware, MiddlewareError, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest, U256, U64};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::chain::{ChainClient, Receipt, TxHandle};
use crate::config::NetworkConfig;
use crate::deploy::ContractDeployer;
use crate::error::{ChainError, ConfigError};

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// JSON-RPC error code wallets use for a declined request.
const USER_REJECTED_CODE: i64 = 4001;
const EXECUTION_REVERTED: &str = "execution reverted";

pub struct RpcClient {
    provider: Provider<Http>,
    signer: Option<Arc<SignerClient>>,
    poll_interval: Duration,
    retries: usize,
}

impl RpcClient {
    /// Build a client for `config`. No network call is made here.
    pub fn connect(config: &NetworkConfig, wallet: Option<LocalWallet>) -> Result<Self, ConfigError> {
        let poll_interval = config.confirmation.poll_interval();
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|_| ConfigError::InvalidRpcUrl(config.rpc_url.clone()))?
            .interval(poll_interval);
        let signer = wallet.map(|wallet| {
            let wallet = wallet.with_chain_id(config.chain_id);
            Arc::new(SignerMiddleware::new(provider.clone(), wallet))
        });
        info!(network = %config.name, rpc = %config.rpc_url, "chain client ready");
        Ok(Self {
            provider,
            signer,
            poll_interval,
            retries: config.confirmation.retries,
        })
    }

    fn signing_client(&self) -> Result<&Arc<SignerClient>, ChainError> {
        self.signer
            .as_ref()
            .ok_or_else(|| ChainError::Connection("no wallet connected".into()))
    }

    /// Deployer reading compiled Hardhat artifacts from `artifacts_dir`.
    pub fn deployer(&self, artifacts_dir: impl Into<PathBuf>) -> Result<ArtifactDeployer, ChainError> {
        Ok(ArtifactDeployer {
            client: self.signing_client()?.clone(),
            artifacts_dir: artifacts_dir.into(),
        })
    }
}

impl ChainClient for RpcClient {
    fn signer(&self) -> Option<Address> {
        self.signer.as_ref().map(|client| client.address())
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(account, None)
            .await
            .map_err(classify)
    }

    async fn call_view(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
    ) -> Result<Vec<Token>, ChainError> {
        let data = function
            .encode_input(args)
            .map_err(|e| ChainError::validation(format!("{}: {e}", function.name)))?;
        let mut tx = TransactionRequest::new().to(contract).data(data);
        if let Some(from) = self.signer() {
            tx = tx.from(from);
        }
        debug!(contract = ?contract, function = %function.name, "eth_call");
        let raw = self
            .provider
            .call(&tx.into(), None)
            .await
            .map_err(classify)?;
        function
            .decode_output(&raw)
            .map_err(|e| ChainError::Decode(format!("{}: {e}", function.name)))
    }

    async fn send_transaction(
        &self,
        contract: Address,
        function: &Function,
        args: &[Token],
        value: Option<U256>,
    ) -> Result<TxHandle, ChainError> {
        let client = self.signing_client()?;
        let data = function
            .encode_input(args)
            .map_err(|e| ChainError::validation(format!("{}: {e}", function.name)))?;
        let mut tx = TransactionRequest::new().to(contract).data(data);
        if let Some(value) = value {
            tx = tx.value(value);
        }
        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(classify_signer)?;
        let hash = *pending;
        info!(contract = ?contract, function = %function.name, tx = ?hash, "transaction sent");
        Ok(TxHandle::new(hash))
    }

    async fn await_confirmation(&self, tx: &TxHandle) -> Result<Receipt, ChainError> {
        let pending = PendingTransaction::new(tx.hash, &self.provider)
            .interval(self.poll_interval)
            .retries(self.retries);
        match pending.await.map_err(classify)? {
            Some(receipt) if receipt.status == Some(U64::zero()) => {
                warn!(tx = ?tx.hash, "transaction reverted");
                Err(ChainError::revert(EXECUTION_REVERTED))
            }
            Some(receipt) => {
                let block_number = receipt.block_number.map(|n| n.as_u64()).unwrap_or_default();
                info!(tx = ?tx.hash, block = block_number, "transaction confirmed");
                Ok(Receipt {
                    tx_hash: receipt.transaction_hash,
                    block_number,
                    contract_address: receipt.contract_address,
                })
            }
            None => Err(ChainError::Timeout(tx.hash)),
        }
    }
}

/// Compiled contract as written by `hardhat compile`.
#[derive(Debug, Deserialize)]
struct HardhatArtifact {
    abi: Abi,
    bytecode: Bytes,
}

pub struct ArtifactDeployer {
    client: Arc<SignerClient>,
    artifacts_dir: PathBuf,
}

impl ArtifactDeployer {
    fn artifact_path(&self, contract: &str) -> PathBuf {
        artifact_path(&self.artifacts_dir, contract)
    }

    fn load(&self, contract: &str) -> Result<HardhatArtifact, ChainError> {
        let path = self.artifact_path(contract);
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| ChainError::validation(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ChainError::Decode(format!("{}: {e}", path.display())))
    }
}

/// `<dir>/contracts/<Name>.sol/<Name>.json`
fn artifact_path(artifacts_dir: &Path, contract: &str) -> PathBuf {
    artifacts_dir
        .join("contracts")
        .join(format!("{contract}.sol"))
        .join(format!("{contract}.json"))
}

impl ContractDeployer for ArtifactDeployer {
    fn deployer(&self) -> Option<Address> {
        Some(self.client.address())
    }

    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address, ChainError> {
        let artifact = self.load(contract)?;
        let factory = ContractFactory::new(artifact.abi, artifact.bytecode, self.client.clone());
        let deployment = factory.deploy_tokens(args).map_err(classify_contract)?;
        let deployed = deployment.send().await.map_err(classify_contract)?;
        Ok(deployed.address())
    }
}

/// Map a provider-level failure onto the client taxonomy.
fn classify<E: MiddlewareError>(err: E) -> ChainError {
    if let Some(response) = err.as_error_response() {
        if response.code == USER_REJECTED_CODE {
            return ChainError::UserRejected;
        }
        if let Some(rest) = response.message.strip_prefix(EXECUTION_REVERTED) {
            let reason = rest.trim_start_matches(':').trim();
            return ChainError::revert(if reason.is_empty() {
                EXECUTION_REVERTED
            } else {
                reason
            });
        }
        return ChainError::Connection(response.message.clone());
    }
    ChainError::Connection(err.to_string())
}

fn classify_signer(err: SignerMiddlewareError<Provider<Http>, LocalWallet>) -> ChainError {
    match err {
        SignerMiddlewareError::SignerError(e) => {
            warn!(error = %e, "signer declined transaction");
            ChainError::UserRejected
        }
        other => classify(other),
    }
}

fn classify_contract(err: ContractError<SignerClient>) -> ChainError {
    match err {
        ContractError::MiddlewareError { e } => classify_signer(e),
        ContractError::ProviderError { e } => classify(e),
        ContractError::Revert(data) => ChainError::revert(data.to_string()),
        other => ChainError::Decode(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_path() {
        assert_eq!(
            artifact_path(Path::new("artifacts"), "TokenFactory"),
            PathBuf::from("artifacts/contracts/TokenFactory.sol/TokenFactory.json")
        );
    }

    #[test]
    fn test_connect_without_wallet_has_no_signer() {
        let config = NetworkConfig::monad_testnet();
        let client = RpcClient::connect(&config, None).unwrap();
        assert!(client.signer().is_none());
        assert!(matches!(
            client.deployer("artifacts"),
            Err(ChainError::Connection(_))
        ));
    }

    #[test]
    fn test_invalid_rpc_url() {
        let mut config = NetworkConfig::monad_testnet();
        config.rpc_url = "not a url".into();
        assert!(matches!(
            RpcClient::connect(&config, None),
            Err(ConfigError::InvalidRpcUrl(_))
        ));
    }

    #[test]
    fn test_hardhat_artifact_parses() {
        let raw = r#"{
            "contractName": "MockDexFactory",
            "abi": [{"type":"constructor","inputs":[{"name":"wmon","type":"address"}],"stateMutability":"nonpayable"}],
            "bytecode": "0x6080"
        }"#;
        let artifact: HardhatArtifact = serde_json::from_str(raw).unwrap();
        assert!(artifact.abi.constructor().is_some());
        assert_eq!(artifact.bytecode.to_vec(), vec![0x60u8, 0x80]);
    }
}
