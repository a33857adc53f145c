//! Per-network deployment of sale contracts.

use std::fmt;

use alloy_core::primitives::Address;

use crate::{
    ContractKind, NetworkId,
    error::OrchestratorError,
    primitive::{ContractHandle, DeploymentPrimitive},
    registry::{Registry, SecondaryEntry},
    sequencer::{InitStep, SequenceMode, SequenceResult, StepFailure, initialize},
};

/// Final state of one contract on one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// The network has no record for this contract. Nothing was sent.
    Skipped {
        contract: ContractKind,
        network: NetworkId,
    },
    /// Deployed (or reused) and every post-deploy step confirmed.
    Completed {
        contract: ContractKind,
        network: NetworkId,
        address: Address,
        reused: bool,
        steps: usize,
    },
    /// Deployed (or reused) but at least one post-deploy step did not confirm.
    PartiallyConfigured {
        contract: ContractKind,
        network: NetworkId,
        address: Address,
        reused: bool,
        failure: StepFailure,
        pending: Vec<InitStep>,
        result: SequenceResult,
    },
}

impl DeploymentOutcome {
    pub fn contract(&self) -> ContractKind {
        match self {
            DeploymentOutcome::Skipped { contract, .. }
            | DeploymentOutcome::Completed { contract, .. }
            | DeploymentOutcome::PartiallyConfigured { contract, .. } => *contract,
        }
    }

    pub fn network(&self) -> NetworkId {
        match self {
            DeploymentOutcome::Skipped { network, .. }
            | DeploymentOutcome::Completed { network, .. }
            | DeploymentOutcome::PartiallyConfigured { network, .. } => *network,
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            DeploymentOutcome::Skipped { .. } => None,
            DeploymentOutcome::Completed { address, .. }
            | DeploymentOutcome::PartiallyConfigured { address, .. } => Some(*address),
        }
    }

    /// `false` only for [`DeploymentOutcome::PartiallyConfigured`].
    pub fn is_success(&self) -> bool {
        !matches!(self, DeploymentOutcome::PartiallyConfigured { .. })
    }

    pub fn status(&self) -> &'static str {
        match self {
            DeploymentOutcome::Skipped { .. } => "skipped",
            DeploymentOutcome::Completed { .. } => "completed",
            DeploymentOutcome::PartiallyConfigured { .. } => "partially configured",
        }
    }
}

impl fmt::Display for DeploymentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentOutcome::Skipped { contract, network } => {
                write!(f, "{} skipped on network {}", contract, network)
            }
            DeploymentOutcome::Completed {
                contract, address, ..
            } => write!(f, "{} completed at {}", contract, address),
            DeploymentOutcome::PartiallyConfigured {
                contract,
                address,
                failure,
                pending,
                ..
            } => write!(
                f,
                "{} at {} partially configured: {} ({} step(s) pending)",
                contract,
                address,
                failure,
                pending.len()
            ),
        }
    }
}

/// Drives registry lookup, deployment and initialization for each contract.
///
/// Holds no chain state of its own; the deployer passed to [`Orchestrator::run`]
/// carries the signer and the deployment store.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Registry,
    mode: SequenceMode,
}

impl Orchestrator {
    pub fn new(registry: Registry, mode: SequenceMode) -> Self {
        Self { registry, mode }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn mode(&self) -> SequenceMode {
        self.mode
    }

    /// Deploy and initialize `contract` on `network`.
    ///
    /// Returns [`DeploymentOutcome::Skipped`] without touching the deployer if
    /// the registry has no record for the network.
    pub async fn run<D: DeploymentPrimitive>(
        &self,
        network: NetworkId,
        deployer: &D,
        contract: ContractKind,
    ) -> Result<DeploymentOutcome, OrchestratorError> {
        let Some(record) = self.registry.lookup(contract, network) else {
            tracing::info!(%network, %contract, "Network not supported, skipping");
            return Ok(DeploymentOutcome::Skipped { contract, network });
        };

        let args = contract.constructor_args(network, record)?;
        let name = contract.artifact_name();

        tracing::info!(%network, %contract, args = args.len(), "Deploying contract");
        for (position, arg) in args.iter().enumerate() {
            tracing::info!(%contract, position, value = %arg, "Constructor argument");
        }

        let deployment = deployer.deploy_or_reuse(&name, &args).await?;
        let address = deployment.handle.address();

        if deployment.reused {
            tracing::info!(%network, %contract, %address, "Reusing existing deployment");
        } else {
            tracing::info!(%network, %contract, %address, "Contract deployed");
        }

        let thresholds = record.post_deploy_thresholds(contract);
        let entries: &[SecondaryEntry] = if contract.has_entry_setters() {
            record.secondary_entries.as_slice()
        } else {
            &[]
        };

        for (threshold, value) in &thresholds {
            tracing::info!(%contract, %threshold, value, "Threshold to apply");
        }
        for entry in entries {
            tracing::info!(%contract, asset = %entry.asset, feed = %entry.feed, "Secondary entry to register");
        }

        let result = initialize(&deployment.handle, &thresholds, entries, self.mode).await;

        if let Some(failure) = result.first_failure().cloned() {
            let pending = result.pending();
            tracing::warn!(
                %network,
                %contract,
                %address,
                failure = %failure,
                pending = pending.len(),
                "Contract partially configured"
            );

            return Ok(DeploymentOutcome::PartiallyConfigured {
                contract,
                network,
                address,
                reused: deployment.reused,
                failure,
                pending,
                result,
            });
        }

        tracing::info!(%network, %contract, %address, steps = result.confirmed.len(), "Deployment completed");

        Ok(DeploymentOutcome::Completed {
            contract,
            network,
            address,
            reused: deployment.reused,
            steps: result.confirmed.len(),
        })
    }

    /// Run `contracts` on `network` in [`ContractKind`] declaration order.
    ///
    /// Stops at the first fatal error. A partially configured contract does
    /// not stop the run.
    pub async fn run_all<D: DeploymentPrimitive>(
        &self,
        network: NetworkId,
        deployer: &D,
        contracts: &[ContractKind],
    ) -> Result<Vec<DeploymentOutcome>, OrchestratorError> {
        let mut contracts = contracts.to_vec();
        contracts.sort();
        contracts.dedup();

        let mut outcomes = Vec::with_capacity(contracts.len());
        for contract in contracts {
            outcomes.push(self.run(network, deployer, contract).await?);
        }

        Ok(outcomes)
    }
}
