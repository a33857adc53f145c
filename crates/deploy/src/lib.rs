//! salekit-deploy - Deployment library for token sale contracts.
//!
//! This crate deploys the sale contract families to EVM chains and brings
//! each deployment into its operating state: thresholds set, accepted assets
//! registered with their price feeds.
//!
//! The [`Orchestrator`] looks a contract up in the [`Registry`], deploys it
//! through a [`DeploymentPrimitive`] and hands the result to the post-deploy
//! [`sequencer`]. [`RpcDeployer`] is the JSON-RPC implementation of the
//! primitive.

pub mod abi;
pub mod artifacts;
pub mod config;
mod contracts;
mod deployer;
pub mod error;
mod network;
mod orchestrator;
pub mod primitive;
pub mod registry;
pub mod rpc;
pub mod sequencer;
pub mod store;

pub use abi::{ConstructorArg, SetterCall};
pub use config::{CONFIG_FILENAME, RunConfig};
pub use contracts::{ArgSlot, ContractKind};
pub use deployer::{RpcContract, RpcDeployer, RpcPendingTx};
pub use error::{ConfigError, DeployError, OrchestratorError, StepError};
pub use network::{KnownNetwork, NetworkId};
pub use orchestrator::{DeploymentOutcome, Orchestrator};
pub use primitive::{ContractHandle, Deployment, DeploymentPrimitive, PendingTransaction, Receipt};
pub use registry::{Activation, ConfigurationRecord, Registry, SecondaryEntry, Threshold};
pub use sequencer::{InitStep, SequenceMode, SequenceResult, StepFailure, initialize};
