//! Fixed-order deployment of the launchpad contracts.

use ethers::abi::Token;
use ethers::types::Address;
use serde::Serialize;
use tracing::info;

use crate::error::{ChainError, DeployError};

pub const DEX_FACTORY: &str = "MockDexFactory";
pub const DEX_ROUTER: &str = "MockDexRouter";
pub const TOKEN_FACTORY: &str = "TokenFactory";

/// Something that can put a named contract on chain.
#[allow(async_fn_in_trait)]
pub trait ContractDeployer {
    /// Account paying for deployments.
    fn deployer(&self) -> Option<Address>;

    /// Deploy `contract` with constructor `args` and wait for it to land.
    async fn deploy(&self, contract: &str, args: Vec<Token>) -> Result<Address, ChainError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContracts {
    pub dex_factory: Address,
    pub dex_router: Address,
    pub token_factory: Address,
}

/// Deploy DexFactory(wmon) → DexRouter(factory, wmon) →
/// TokenFactory(factory, router, wmon). Stops at the first failure.
pub async fn deploy_stack<D: ContractDeployer>(
    deployer: &D,
    wrapped_native: Address,
) -> Result<DeployedContracts, DeployError> {
    let dex_factory = deploy_one(deployer, DEX_FACTORY, vec![Token::Address(wrapped_native)]).await?;

    let dex_router = deploy_one(
        deployer,
        DEX_ROUTER,
        vec![Token::Address(dex_factory), Token::Address(wrapped_native)],
    )
    .await?;

    let token_factory = deploy_one(
        deployer,
        TOKEN_FACTORY,
        vec![
            Token::Address(dex_factory),
            Token::Address(dex_router),
            Token::Address(wrapped_native),
        ],
    )
    .await?;

    info!("deployment complete");
    Ok(DeployedContracts {
        dex_factory,
        dex_router,
        token_factory,
    })
}

async fn deploy_one<D: ContractDeployer>(
    deployer: &D,
    contract: &str,
    args: Vec<Token>,
) -> Result<Address, DeployError> {
    info!(contract, "deploying");
    let address = deployer
        .deploy(contract, args)
        .await
        .map_err(|source| DeployError {
            contract: contract.to_string(),
            source,
        })?;
    info!(contract, address = ?address, "deployed");
    Ok(address)
}
