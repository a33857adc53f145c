//! Error kinds surfaced by the orchestrator.
//!
//! Plumbing (file I/O, JSON-RPC) reports through [`anyhow`]; these types exist
//! where a caller has to tell failures apart.

use std::time::Duration;

use alloy_core::primitives::TxHash;

use crate::{ContractKind, NetworkId};

/// A registry entry that cannot be turned into a deployment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid network identifier '{0}' in registry")]
    InvalidNetwork(String),

    #[error("unknown contract '{0}' in registry")]
    UnknownContract(String),

    #[error("{contract} on network {network}: missing required field '{field}'")]
    MissingField {
        contract: ContractKind,
        network: NetworkId,
        field: &'static str,
    },

    #[error("{contract} on network {network}: {reason}")]
    Unsupported {
        contract: ContractKind,
        network: NetworkId,
        reason: String,
    },

    #[error("failed to parse registry: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The deployment primitive could not produce a usable contract.
#[derive(Debug, thiserror::Error)]
#[error("failed to deploy {contract}: {reason}")]
pub struct DeployError {
    pub contract: String,
    pub reason: String,
}

impl DeployError {
    pub fn new(contract: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            contract: contract.into(),
            reason: reason.into(),
        }
    }
}

/// A single post-deploy setter call did not confirm.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StepError {
    #[error("submission rejected: {0}")]
    Submission(String),

    #[error("transaction {0} reverted")]
    Reverted(TxHash),

    #[error("transaction {tx_hash} not confirmed within {timeout:?}")]
    Timeout { tx_hash: TxHash, timeout: Duration },

    #[error("rpc error while awaiting {tx_hash}: {reason}")]
    Rpc { tx_hash: TxHash, reason: String },
}

/// Fatal failures that abort a run before or during deployment.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("configuration invalid: {0}")]
    ConfigurationInvalid(#[from] ConfigError),

    #[error(transparent)]
    DeployFailed(#[from] DeployError),
}
