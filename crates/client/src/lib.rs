//! Client for the token launchpad: chain access, the launched-token
//! registry, user session state and the orchestrated launch, trade and
//! graduation actions, plus the fixed-order contract deployment.

pub mod abi;
pub mod amount;
pub mod app;
pub mod chain;
pub mod config;
pub mod deploy;
pub mod devnet;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod rpc;
pub mod session;

#[cfg(test)]
mod testing;

pub use app::LaunchpadApp;
pub use chain::{ChainClient, Receipt, TxHandle};
pub use config::NetworkConfig;
pub use deploy::{deploy_stack, ContractDeployer, DeployedContracts};
pub use error::{ChainError, ConfigError, DeployError};
pub use orchestrator::{ActionKind, ActionOrchestrator, ActionRun, ActionState};
pub use registry::{LaunchedToken, TokenRegistryView};
pub use rpc::RpcClient;
