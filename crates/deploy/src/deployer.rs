//! Deployment over JSON-RPC.
//!
//! Transactions are sent with `eth_sendTransaction` from an account the node
//! manages. Every creation is recorded in the [`DeploymentStore`] so later runs
//! reuse it. A creation is recorded as pending as soon as the node accepts it,
//! so a run that stops before the receipt arrives does not send it twice.

use alloy_core::primitives::{Address, Bytes, TxHash, U64};
use anyhow::{Context, Result};

use crate::{
    NetworkId,
    abi::{ConstructorArg, SetterCall, encode_constructor_args},
    artifacts::ArtifactStore,
    config::RunConfig,
    error::{DeployError, StepError},
    primitive::{ContractHandle, Deployment, DeploymentPrimitive, PendingTransaction, Receipt},
    rpc::{ConfirmationPolicy, RpcClient, TransactionReceipt, TransactionRequest},
    store::{DeploymentRecord, DeploymentStore, PendingCreation, fingerprint},
};

/// Deploys contracts on the chain behind one RPC endpoint.
#[derive(Debug)]
pub struct RpcDeployer {
    client: RpcClient,
    network: NetworkId,
    from: Address,
    artifacts: ArtifactStore,
    store: DeploymentStore,
    policy: ConfirmationPolicy,
    gas: Option<U64>,
    force_redeploy: bool,
}

impl RpcDeployer {
    /// Connect to the configured endpoint and open its deployment store.
    ///
    /// The network is whatever the endpoint reports through `eth_chainId`; if
    /// the configuration names one, the two must agree.
    pub async fn connect(config: &RunConfig) -> Result<Self> {
        let client = RpcClient::new(config.rpc_url()?, config.request_timeout())?;

        let network = NetworkId(
            client
                .chain_id()
                .await
                .with_context(|| format!("Failed to query chain id from {}", client.url()))?,
        );

        if let Some(expected) = config.network {
            if expected != network {
                anyhow::bail!(
                    "Endpoint {} serves chain {}, but network {} was requested",
                    client.url(),
                    network,
                    expected
                );
            }
        }

        let from = match config.from {
            Some(from) => from,
            None => client
                .accounts()
                .await
                .context("Failed to list node accounts")?
                .into_iter()
                .next()
                .context("Node manages no accounts; set `from` in the configuration")?,
        };

        let store = DeploymentStore::open(&config.deployments_dir, network)?;

        tracing::info!(
            %network,
            known = ?network.known(),
            %from,
            rpc_url = %client.url(),
            "Connected to network"
        );

        Ok(Self {
            client,
            network,
            from,
            artifacts: ArtifactStore::new(&config.artifacts_dir),
            store,
            policy: config.confirmation_policy(),
            gas: config.gas_limit.map(U64::from),
            force_redeploy: config.force_redeploy,
        })
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// The account every transaction is sent from.
    pub fn signer(&self) -> Address {
        self.from
    }

    fn handle(&self, address: Address) -> RpcContract {
        RpcContract {
            client: self.client.clone(),
            address,
            from: self.from,
            policy: self.policy,
            gas: self.gas,
        }
    }

    /// The stored deployment of `name`, if it matches `fingerprint` and still
    /// has code on chain.
    async fn reusable(&self, name: &str, fingerprint: &str) -> Result<Option<DeploymentRecord>> {
        let record = self.store.load(name)?;

        let code = match &record {
            Some(record) if !self.force_redeploy && record.fingerprint == fingerprint => Some(
                self.client
                    .code_at(record.address)
                    .await
                    .with_context(|| format!("Failed to fetch code at {}", record.address))?,
            ),
            _ => None,
        };

        let decision = reuse_decision(
            record.as_ref(),
            fingerprint,
            code.as_ref().map(|code| &code[..]),
            self.force_redeploy,
        );

        match decision {
            ReuseDecision::Reuse => return Ok(record),
            ReuseDecision::NoRecord => {}
            ReuseDecision::NoCode => {
                tracing::warn!(contract = %name, reason = %decision, "Redeploying");
            }
            ReuseDecision::Forced | ReuseDecision::Changed => {
                tracing::info!(contract = %name, reason = %decision, "Redeploying");
            }
        }

        Ok(None)
    }

    /// Settle a creation a previous run sent but never saw confirmed.
    ///
    /// Returns the transaction and the deployed address when it created the
    /// same contract. A transaction that is still unconfirmed is an error, so
    /// the contract is never created twice.
    async fn resume_pending(&self, name: &str, fingerprint: &str) -> Result<Option<(TxHash, Address)>> {
        let Some(pending) = self.store.load_pending(name)? else {
            return Ok(None);
        };
        let tx_hash = pending.transaction_hash;

        if self.force_redeploy || pending.fingerprint != fingerprint {
            tracing::info!(contract = %name, %tx_hash, "Discarding pending creation with different inputs");
            self.store.clear_pending(name)?;
            return Ok(None);
        }

        tracing::info!(contract = %name, %tx_hash, "Resuming pending creation");
        let confirmation = self.client.wait_for_receipt(tx_hash, self.policy).await;

        match resolve_pending(confirmation) {
            PendingResolution::Deployed(address) => Ok(Some((tx_hash, address))),
            PendingResolution::Failed(reason) => {
                tracing::warn!(contract = %name, %tx_hash, %reason, "Pending creation failed, sending again");
                self.store.clear_pending(name)?;
                Ok(None)
            }
            PendingResolution::Unresolved(error) => Err(error).with_context(|| {
                format!(
                    "Creation transaction {} of {} is still unconfirmed; rerun later or force a redeploy",
                    tx_hash, name
                )
            }),
        }
    }

    /// Send a creation transaction and wait for the contract address.
    ///
    /// The transaction is saved as pending before waiting; it stays pending
    /// if no receipt arrives in time.
    async fn create(
        &self,
        name: &str,
        data: Bytes,
        fingerprint: &str,
        args: &[ConstructorArg],
    ) -> Result<(TxHash, Address)> {
        let request = TransactionRequest {
            from: self.from,
            to: None,
            data,
            gas: self.gas,
        };
        let tx_hash = self
            .client
            .send_transaction(&request)
            .await
            .context("Failed to send creation transaction")?;
        tracing::info!(contract = %name, %tx_hash, "Creation transaction sent");

        self.store.save_pending(&PendingCreation::new(
            name,
            tx_hash,
            fingerprint.to_string(),
            args.to_vec(),
        ))?;

        match resolve_pending(self.client.wait_for_receipt(tx_hash, self.policy).await) {
            PendingResolution::Deployed(address) => Ok((tx_hash, address)),
            PendingResolution::Failed(reason) => {
                self.store.clear_pending(name)?;
                anyhow::bail!("Creation transaction {} failed: {}", tx_hash, reason)
            }
            PendingResolution::Unresolved(error) => Err(error.into()),
        }
    }

    async fn deploy(&self, name: &str, args: &[ConstructorArg]) -> Result<Deployment<RpcContract>> {
        let artifact = self.artifacts.load(name)?;
        let encoded_args = encode_constructor_args(args);
        let fingerprint = fingerprint(&artifact.bytecode, &encoded_args);

        if let Some(record) = self.reusable(name, &fingerprint).await? {
            return Ok(Deployment {
                handle: self.handle(record.address),
                reused: true,
            });
        }

        let (tx_hash, address) = match self.resume_pending(name, &fingerprint).await? {
            Some(resumed) => resumed,
            None => {
                self.create(name, artifact.creation_code(&encoded_args), &fingerprint, args)
                    .await?
            }
        };

        self.store.save(&DeploymentRecord::new(
            name,
            address,
            tx_hash,
            args.to_vec(),
            artifact.abi,
            fingerprint,
        ))?;
        self.store.clear_pending(name)?;

        Ok(Deployment {
            handle: self.handle(address),
            reused: false,
        })
    }
}

/// Whether a stored deployment can stand in for a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
enum ReuseDecision {
    #[strum(to_string = "stored deployment matches")]
    Reuse,
    #[strum(to_string = "redeploy forced")]
    Forced,
    #[strum(to_string = "no stored deployment")]
    NoRecord,
    #[strum(to_string = "bytecode or constructor arguments changed")]
    Changed,
    #[strum(to_string = "no code at recorded address")]
    NoCode,
}

/// `code` is what the chain holds at the recorded address, `None` if it was
/// not fetched.
fn reuse_decision(
    record: Option<&DeploymentRecord>,
    fingerprint: &str,
    code: Option<&[u8]>,
    force: bool,
) -> ReuseDecision {
    if force {
        return ReuseDecision::Forced;
    }
    let Some(record) = record else {
        return ReuseDecision::NoRecord;
    };
    if record.fingerprint != fingerprint {
        return ReuseDecision::Changed;
    }
    match code {
        Some(code) if !code.is_empty() => ReuseDecision::Reuse,
        _ => ReuseDecision::NoCode,
    }
}

/// What became of a creation transaction.
#[derive(Debug, PartialEq, Eq)]
enum PendingResolution {
    /// Mined, and the receipt names the new contract.
    Deployed(Address),
    /// Mined without creating a contract. Sending it again is safe.
    Failed(String),
    /// Not known to be mined. It may still land.
    Unresolved(StepError),
}

fn resolve_pending(confirmation: Result<TransactionReceipt, StepError>) -> PendingResolution {
    match confirmation {
        Ok(receipt) => match receipt.contract_address {
            Some(address) => PendingResolution::Deployed(address),
            None => PendingResolution::Failed("receipt has no contract address".to_string()),
        },
        Err(error @ StepError::Reverted(_)) => PendingResolution::Failed(error.to_string()),
        Err(error) => PendingResolution::Unresolved(error),
    }
}

impl DeploymentPrimitive for RpcDeployer {
    type Handle = RpcContract;

    async fn deploy_or_reuse(
        &self,
        name: &str,
        args: &[ConstructorArg],
    ) -> Result<Deployment<RpcContract>, DeployError> {
        self.deploy(name, args)
            .await
            .map_err(|e| DeployError::new(name, format!("{:#}", e)))
    }
}

/// A deployed contract reachable through the deployer's endpoint.
#[derive(Debug, Clone)]
pub struct RpcContract {
    client: RpcClient,
    address: Address,
    from: Address,
    policy: ConfirmationPolicy,
    gas: Option<U64>,
}

impl ContractHandle for RpcContract {
    type Pending = RpcPendingTx;

    fn address(&self) -> Address {
        self.address
    }

    async fn invoke(&self, call: &SetterCall) -> Result<RpcPendingTx, StepError> {
        let request = TransactionRequest {
            from: self.from,
            to: Some(self.address),
            data: call.calldata(),
            gas: self.gas,
        };

        let tx_hash = self
            .client
            .send_transaction(&request)
            .await
            .map_err(|e| StepError::Submission(format!("{:#}", e)))?;

        Ok(RpcPendingTx {
            client: self.client.clone(),
            tx_hash,
            policy: self.policy,
        })
    }
}

/// A setter transaction accepted by the node.
#[derive(Debug)]
pub struct RpcPendingTx {
    client: RpcClient,
    tx_hash: TxHash,
    policy: ConfirmationPolicy,
}

impl PendingTransaction for RpcPendingTx {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn confirmation(self) -> Result<Receipt, StepError> {
        let receipt = self
            .client
            .wait_for_receipt(self.tx_hash, self.policy)
            .await?;

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block(),
        })
    }
}
