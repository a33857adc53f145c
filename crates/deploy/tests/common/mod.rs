//! In-memory chain used to drive the orchestrator without a node.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use alloy_core::primitives::{Address, B256, TxHash};
use salekit_deploy::{
    ConstructorArg, ContractHandle, DeployError, Deployment, DeploymentPrimitive,
    PendingTransaction, Receipt, SecondaryEntry, SetterCall, StepError,
};

/// Everything the mock chain observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Create {
        name: String,
        args: Vec<ConstructorArg>,
        address: Address,
    },
    Submit {
        address: Address,
        call: SetterCall,
    },
    Confirm {
        address: Address,
        call: SetterCall,
    },
}

/// A one-shot failure injected for a specific setter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The node rejects the transaction.
    Submission,
    /// The transaction is accepted but reverts.
    Revert,
    /// The transaction is accepted but never mined.
    Timeout,
}

#[derive(Debug, Default)]
struct State {
    events: Vec<Event>,
    deployed: HashMap<String, Address>,
    faults: Vec<(SetterCall, Fault)>,
    failing_deploys: Vec<String>,
    tx_count: u64,
}

impl State {
    fn next_tx_hash(&mut self) -> TxHash {
        self.tx_count += 1;
        B256::left_padding_from(&self.tx_count.to_be_bytes())
    }
}

/// Shared handle to the in-memory chain.
#[derive(Debug, Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<State>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, call: SetterCall, fault: Fault) {
        self.state.lock().unwrap().faults.push((call, fault));
    }

    pub fn fail_deploy(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_deploys
            .push(name.to_string());
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// Every transaction sent: creations and setter submissions.
    pub fn transaction_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| !matches!(event, Event::Confirm { .. }))
            .count()
    }

    pub fn creations(&self) -> Vec<(String, Vec<ConstructorArg>)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Create { name, args, .. } => Some((name, args)),
                _ => None,
            })
            .collect()
    }

    pub fn submitted_calls(&self) -> Vec<SetterCall> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Submit { call, .. } => Some(call),
                _ => None,
            })
            .collect()
    }

    pub fn confirmed_calls(&self) -> Vec<SetterCall> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Confirm { call, .. } => Some(call),
                _ => None,
            })
            .collect()
    }

    fn take_fault(&self, call: &SetterCall) -> Option<Fault> {
        let mut state = self.state.lock().unwrap();
        let position = state.faults.iter().position(|(c, _)| c == call)?;
        Some(state.faults.remove(position).1)
    }
}

impl DeploymentPrimitive for MockChain {
    type Handle = MockContract;

    async fn deploy_or_reuse(
        &self,
        name: &str,
        args: &[ConstructorArg],
    ) -> Result<Deployment<MockContract>, DeployError> {
        let mut state = self.state.lock().unwrap();

        if state.failing_deploys.iter().any(|n| n == name) {
            return Err(DeployError::new(name, "insufficient funds for gas"));
        }

        let (address, reused) = match state.deployed.get(name) {
            Some(address) => (*address, true),
            None => {
                let address = Address::with_last_byte(0xc0 + state.deployed.len() as u8);
                state.deployed.insert(name.to_string(), address);
                state.next_tx_hash();
                state.events.push(Event::Create {
                    name: name.to_string(),
                    args: args.to_vec(),
                    address,
                });
                (address, false)
            }
        };

        Ok(Deployment {
            handle: MockContract {
                chain: self.clone(),
                address,
            },
            reused,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MockContract {
    chain: MockChain,
    address: Address,
}

impl ContractHandle for MockContract {
    type Pending = MockPending;

    fn address(&self) -> Address {
        self.address
    }

    async fn invoke(&self, call: &SetterCall) -> Result<MockPending, StepError> {
        let fault = self.chain.take_fault(call);
        if fault == Some(Fault::Submission) {
            return Err(StepError::Submission("replacement transaction underpriced".to_string()));
        }

        let tx_hash = {
            let mut state = self.chain.state.lock().unwrap();
            state.events.push(Event::Submit {
                address: self.address,
                call: call.clone(),
            });
            state.next_tx_hash()
        };

        Ok(MockPending {
            chain: self.chain.clone(),
            address: self.address,
            call: call.clone(),
            tx_hash,
            fault,
        })
    }
}

#[derive(Debug)]
pub struct MockPending {
    chain: MockChain,
    address: Address,
    call: SetterCall,
    tx_hash: TxHash,
    fault: Option<Fault>,
}

impl PendingTransaction for MockPending {
    fn tx_hash(&self) -> TxHash {
        self.tx_hash
    }

    async fn confirmation(self) -> Result<Receipt, StepError> {
        // Let other in-flight transactions make progress before this one is mined.
        tokio::task::yield_now().await;

        match self.fault {
            Some(Fault::Revert) => Err(StepError::Reverted(self.tx_hash)),
            Some(Fault::Timeout) => Err(StepError::Timeout {
                tx_hash: self.tx_hash,
                timeout: std::time::Duration::from_secs(1),
            }),
            _ => {
                let mut state = self.chain.state.lock().unwrap();
                state.events.push(Event::Confirm {
                    address: self.address,
                    call: self.call,
                });
                Ok(Receipt {
                    tx_hash: self.tx_hash,
                    block_number: Some(state.tx_count),
                })
            }
        }
    }
}

pub fn entry(n: u8) -> SecondaryEntry {
    SecondaryEntry {
        asset: Address::with_last_byte(n),
        feed: Address::with_last_byte(0x80 + n),
    }
}

pub fn register(n: u8) -> SetterCall {
    SetterCall::SupportedToken(entry(n))
}

/// Route library logs through the test harness.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
