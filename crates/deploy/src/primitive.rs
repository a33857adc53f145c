//! The boundary between orchestration and the chain.
//!
//! The orchestrator and sequencer only ever talk to these traits. The RPC
//! implementation lives in [`crate::deployer`]; tests provide in-memory ones.

use std::future::Future;

use alloy_core::primitives::{Address, TxHash};

use crate::{
    abi::{ConstructorArg, SetterCall},
    error::{DeployError, StepError},
};

/// A mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

/// Result of a deploy-or-reuse request.
#[derive(Debug, Clone)]
pub struct Deployment<H> {
    pub handle: H,
    /// `true` when an existing deployment was reused and no creation
    /// transaction was sent.
    pub reused: bool,
}

/// Idempotent contract deployment.
///
/// Requesting the same contract name twice against the same deployment store
/// returns the existing instance instead of creating a new one.
pub trait DeploymentPrimitive: Send + Sync {
    type Handle: ContractHandle;

    fn deploy_or_reuse(
        &self,
        name: &str,
        args: &[ConstructorArg],
    ) -> impl Future<Output = Result<Deployment<Self::Handle>, DeployError>> + Send;
}

/// A deployed contract exposing state-mutating entry points.
pub trait ContractHandle: Send + Sync {
    type Pending: PendingTransaction;

    fn address(&self) -> Address;

    /// Submit `call` and return as soon as the transaction is accepted by the
    /// node, without waiting for it to be mined.
    fn invoke(
        &self,
        call: &SetterCall,
    ) -> impl Future<Output = Result<Self::Pending, StepError>> + Send;
}

/// A submitted transaction that can be awaited until it is mined.
pub trait PendingTransaction: Send {
    fn tx_hash(&self) -> TxHash;

    fn confirmation(self) -> impl Future<Output = Result<Receipt, StepError>> + Send;
}
