//! Post-deploy initialization.
//!
//! Applies threshold setters and secondary entry registrations to a freshly
//! deployed (or reused) contract. Every call is its own transaction and only
//! counts once it is mined.

use std::{collections::BTreeMap, fmt};

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    abi::SetterCall,
    error::StepError,
    primitive::{ContractHandle, PendingTransaction, Receipt},
    registry::{SecondaryEntry, Threshold},
};

/// How secondary entries are submitted.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SequenceMode {
    /// Entry i+1 is submitted only after entry i is mined. Halts on the first failure.
    #[default]
    Sequential,
    /// All entries are submitted up front, then every confirmation is awaited.
    Concurrent,
}

/// One post-deploy setter call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStep {
    SetThreshold { threshold: Threshold, value: u64 },
    RegisterEntry { index: usize, entry: SecondaryEntry },
}

impl InitStep {
    pub fn call(&self) -> SetterCall {
        match self {
            InitStep::SetThreshold { threshold, value } => SetterCall::Threshold {
                threshold: *threshold,
                value: *value,
            },
            InitStep::RegisterEntry { entry, .. } => SetterCall::SupportedToken(*entry),
        }
    }

    /// Index into the secondary entries, for entry registrations.
    pub fn entry_index(&self) -> Option<usize> {
        match self {
            InitStep::RegisterEntry { index, .. } => Some(*index),
            InitStep::SetThreshold { .. } => None,
        }
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStep::SetThreshold { .. } => write!(f, "{}", self.call()),
            InitStep::RegisterEntry { index, .. } => write!(f, "#{} {}", index, self.call()),
        }
    }
}

/// A step whose transaction was rejected, reverted or never confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub step: InitStep,
    pub error: StepError,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.error)
    }
}

/// What happened to every step of an initialization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceResult {
    /// Confirmed steps, in entry order.
    pub confirmed: Vec<InitStep>,
    /// Failed steps. Sequential runs hold at most one.
    pub failed: Vec<StepFailure>,
    /// Steps that were never submitted because an earlier step failed.
    pub not_attempted: Vec<InitStep>,
}

impl SequenceResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }

    pub fn first_failure(&self) -> Option<&StepFailure> {
        self.failed.first()
    }

    pub fn confirmed_entries(&self) -> Vec<usize> {
        self.confirmed.iter().filter_map(InitStep::entry_index).collect()
    }

    pub fn failed_entries(&self) -> Vec<usize> {
        self.failed
            .iter()
            .filter_map(|failure| failure.step.entry_index())
            .collect()
    }

    /// Steps still needing attention: failed ones, then the unattempted ones.
    pub fn pending(&self) -> Vec<InitStep> {
        self.failed
            .iter()
            .map(|failure| failure.step.clone())
            .chain(self.not_attempted.iter().cloned())
            .collect()
    }

    /// Secondary entries that are not confirmed, in their original order.
    ///
    /// Passing these back to [`initialize`] resumes the run; re-registering a
    /// pair that already landed is harmless.
    pub fn remaining_entries(&self) -> Vec<SecondaryEntry> {
        let mut remaining: Vec<(usize, SecondaryEntry)> = self
            .pending()
            .into_iter()
            .filter_map(|step| match step {
                InitStep::RegisterEntry { index, entry } => Some((index, entry)),
                InitStep::SetThreshold { .. } => None,
            })
            .collect();
        remaining.sort_by_key(|(index, _)| *index);
        remaining.into_iter().map(|(_, entry)| entry).collect()
    }
}

/// Submit one step and block until it is mined.
async fn apply<H: ContractHandle>(handle: &H, step: &InitStep) -> Result<Receipt, StepError> {
    tracing::info!(contract = %handle.address(), step = %step, "Submitting setter call");

    let pending = handle.invoke(&step.call()).await?;
    tracing::debug!(tx_hash = %pending.tx_hash(), "Awaiting confirmation");

    let receipt = pending.confirmation().await?;
    tracing::info!(
        tx_hash = %receipt.tx_hash,
        block_number = ?receipt.block_number,
        step = %step,
        "Setter call confirmed"
    );

    Ok(receipt)
}

/// Apply `steps` one at a time; stop at the first failure.
async fn run_sequential<H: ContractHandle>(
    handle: &H,
    steps: Vec<InitStep>,
    result: &mut SequenceResult,
) {
    let mut steps = steps.into_iter();

    for step in steps.by_ref() {
        match apply(handle, &step).await {
            Ok(_) => result.confirmed.push(step),
            Err(error) => {
                tracing::error!(step = %step, error = %error, "Setter call failed, halting");
                result.failed.push(StepFailure { step, error });
                break;
            }
        }
    }

    result.not_attempted.extend(steps);
}

/// Submit every step without waiting in between, then join all confirmations.
async fn run_concurrent<H: ContractHandle>(
    handle: &H,
    steps: Vec<InitStep>,
    result: &mut SequenceResult,
) {
    let submissions = join_all(steps.iter().map(|step| async move {
        tracing::info!(contract = %handle.address(), step = %step, "Submitting setter call");
        let call = step.call();
        handle.invoke(&call).await
    }))
    .await;

    let mut in_flight = Vec::with_capacity(steps.len());
    for (step, submission) in steps.into_iter().zip(submissions) {
        match submission {
            Ok(pending) => in_flight.push((step, pending)),
            Err(error) => {
                tracing::error!(step = %step, error = %error, "Setter call rejected");
                result.failed.push(StepFailure { step, error });
            }
        }
    }

    tracing::debug!(count = in_flight.len(), "Awaiting confirmations");

    let (steps, pendings): (Vec<_>, Vec<_>) = in_flight.into_iter().unzip();
    let confirmations = join_all(pendings.into_iter().map(|pending| pending.confirmation())).await;

    for (step, confirmation) in steps.into_iter().zip(confirmations) {
        match confirmation {
            Ok(receipt) => {
                tracing::info!(tx_hash = %receipt.tx_hash, step = %step, "Setter call confirmed");
                result.confirmed.push(step);
            }
            Err(error) => {
                tracing::error!(step = %step, error = %error, "Setter call failed");
                result.failed.push(StepFailure { step, error });
            }
        }
    }

    result
        .failed
        .sort_by_key(|failure| failure.step.entry_index().unwrap_or(usize::MAX));
}

/// Bring a deployed contract into its operating state.
///
/// Thresholds are always applied first and one at a time; if one fails nothing
/// else is submitted. Secondary entries follow, according to `mode`. Nothing is
/// retried here; see [`SequenceResult::remaining_entries`].
pub async fn initialize<H: ContractHandle>(
    handle: &H,
    thresholds: &BTreeMap<Threshold, u64>,
    entries: &[SecondaryEntry],
    mode: SequenceMode,
) -> SequenceResult {
    let threshold_steps: Vec<InitStep> = thresholds
        .iter()
        .map(|(threshold, value)| InitStep::SetThreshold {
            threshold: *threshold,
            value: *value,
        })
        .collect();
    let entry_steps: Vec<InitStep> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| InitStep::RegisterEntry {
            index,
            entry: *entry,
        })
        .collect();

    let mut result = SequenceResult::default();

    run_sequential(handle, threshold_steps, &mut result).await;
    if !result.is_complete() {
        result.not_attempted.extend(entry_steps);
        return result;
    }

    if !entry_steps.is_empty() {
        tracing::info!(
            contract = %handle.address(),
            entries = entry_steps.len(),
            mode = %mode,
            "Registering secondary entries"
        );
    }

    match mode {
        SequenceMode::Sequential => run_sequential(handle, entry_steps, &mut result).await,
        SequenceMode::Concurrent => run_concurrent(handle, entry_steps, &mut result).await,
    }

    result
}
