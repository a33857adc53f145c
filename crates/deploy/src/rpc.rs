//! JSON-RPC client for the target chain.

use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash, U64};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use url::Url;

use crate::error::StepError;

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or returned an error response.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url.clone())
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!(
            "RPC error: {}",
            error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
        );
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Parameters of `eth_sendTransaction`. Signed by the node's unlocked account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` for contract creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
}

/// The fields of `eth_getTransactionReceipt` this tool reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
    #[serde(default)]
    pub contract_address: Option<Address>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.is_none_or(|status| status != U64::ZERO)
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number.map(|block| block.to::<u64>())
    }
}

/// How long to wait for a transaction to be mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl ConfirmationPolicy {
    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        (self.timeout.as_millis() / interval).max(1) as usize
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Outcome of a single receipt poll.
enum Poll {
    Pending,
    Failed(anyhow::Error),
}

/// A JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: Url,
}

impl RpcClient {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, anyhow::Error> {
        json_rpc_call(&self.http, &self.url, method, params).await
    }

    pub async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        let chain_id: U64 = self.call("eth_chainId", vec![]).await?;
        Ok(chain_id.to::<u64>())
    }

    pub async fn accounts(&self) -> Result<Vec<Address>, anyhow::Error> {
        self.call("eth_accounts", vec![]).await
    }

    pub async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TxHash, anyhow::Error> {
        self.call(
            "eth_sendTransaction",
            vec![serde_json::to_value(request).context("Failed to encode transaction")?],
        )
        .await
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<TransactionReceipt>, anyhow::Error> {
        self.call("eth_getTransactionReceipt", vec![serde_json::json!(tx_hash)])
            .await
    }

    pub async fn code_at(&self, address: Address) -> Result<Bytes, anyhow::Error> {
        self.call(
            "eth_getCode",
            vec![serde_json::json!(address), serde_json::json!("latest")],
        )
        .await
    }

    /// Poll until `tx_hash` is mined or `policy.timeout` elapses.
    ///
    /// A reverted transaction is an error. RPC failures while polling are not
    /// retried.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        policy: ConfirmationPolicy,
    ) -> Result<TransactionReceipt, StepError> {
        let poll = move || async move {
            match self.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(Poll::Pending),
                Err(e) => Err(Poll::Failed(e)),
            }
        };

        let receipt = poll
            .retry(
                ConstantBuilder::default()
                    .with_delay(policy.poll_interval)
                    .with_max_times(policy.max_polls()),
            )
            .sleep(tokio::time::sleep)
            .when(|e| matches!(e, Poll::Pending))
            .notify(|_, _| tracing::trace!(%tx_hash, "Transaction not mined yet"))
            .await
            .map_err(|e| match e {
                Poll::Pending => StepError::Timeout {
                    tx_hash,
                    timeout: policy.timeout,
                },
                Poll::Failed(e) => StepError::Rpc {
                    tx_hash,
                    reason: format!("{:#}", e),
                },
            })?;

        if !receipt.succeeded() {
            return Err(StepError::Reverted(tx_hash));
        }

        Ok(receipt)
    }
}
