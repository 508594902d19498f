use std::path::PathBuf;

use ethers::types::TxHash;
use thiserror::Error;

/// Failures surfaced by chain calls and the actions built on them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("no wallet or provider available: {0}")]
    Connection(String),
    #[error("transaction rejected by signer")]
    UserRejected,
    #[error("execution reverted: {reason}")]
    Revert { reason: String },
    #[error("transaction {0:?} was not confirmed in time")]
    Timeout(TxHash),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ChainError {
    pub fn revert(reason: impl Into<String>) -> Self {
        ChainError::Revert {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ChainError::Validation(message.into())
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, ChainError::Revert { .. })
    }

    /// Revert reason as reported by the node, if this is a revert.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ChainError::Revert { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PRIVATE_KEY is not set")]
    MissingSigner,
    #[error("invalid signing key: {0}")]
    InvalidSigner(String),
    #[error("invalid rpc url {0}")]
    InvalidRpcUrl(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("launch approval {approval} is below the launch fee {fee}")]
    ApprovalBelowFee { approval: String, fee: String },
}

#[derive(Debug, Error)]
#[error("failed to deploy {contract}: {source}")]
pub struct DeployError {
    pub contract: String,
    #[source]
    pub source: ChainError,
}
