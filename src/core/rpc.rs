//! Minimal JSON-RPC client for receipt tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256, U64};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

pub use alloy_rpc_types_eth::{Log, TransactionReceipt};

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Decode an `eth_getTransactionReceipt` result. `null` and pending
/// receipts (no block number yet) decode to `None`.
pub fn decode_receipt(value: Value) -> Result<Option<TransactionReceipt>> {
    let receipt: Option<TransactionReceipt> = serde_json::from_value(value)
        .map_err(|e| Error::internal_json(e.to_string(), Some("decode receipt".to_string())))?;
    Ok(receipt.filter(|r| r.block_number.is_some()))
}

/// First log whose topic 0 equals `topic0`, optionally restricted to an emitter.
pub fn find_log(receipt: &TransactionReceipt, topic0: B256, emitter: Option<Address>) -> Option<&Log> {
    receipt.inner.logs().iter().find(|log| {
        log.inner.data.topics().first() == Some(&topic0)
            && emitter.map_or(true, |addr| log.inner.address == addr)
    })
}

/// Indexed argument `index` (1-based, topic 0 is the event) as a uint256.
pub fn indexed_uint(log: &Log, index: usize) -> Option<U256> {
    log.inner
        .data
        .topics()
        .get(index)
        .map(|topic| U256::from_be_bytes(topic.0))
}

/// How long and how deep to wait for a receipt.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptPolicy {
    pub confirmations: u64,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

/// A receipt mined in `block` has `head - block + 1` confirmations.
pub fn is_confirmed(head: u64, block: u64, confirmations: u64) -> bool {
    head.saturating_add(1) >= block.saturating_add(confirmations)
}

/// The two chain reads receipt polling needs.
pub trait ReceiptReader {
    fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>>;
    fn head(&self) -> Result<u64>;
}

/// Poll until `tx_hash` is mined with enough confirmations, at most
/// `policy.max_polls` times.
///
/// A reverted receipt fails immediately.
pub fn poll_receipt<R>(reader: &R, tx_hash: B256, policy: &ReceiptPolicy) -> Result<TransactionReceipt>
where
    R: ReceiptReader + ?Sized,
{
    for poll in 1..=policy.max_polls {
        if let Some(receipt) = reader.receipt(tx_hash)? {
            let block = receipt.block_number.unwrap_or_default();
            if !receipt.inner.status() {
                return Err(Error::rpc_transaction_reverted(tx_hash.to_string(), block));
            }
            if policy.confirmations <= 1 || is_confirmed(reader.head()?, block, policy.confirmations) {
                tracing::debug!(target: "rpc", %tx_hash, block, poll, "receipt confirmed");
                return Ok(receipt);
            }
        }
        if poll < policy.max_polls {
            std::thread::sleep(policy.poll_interval);
        }
    }

    Err(Error::rpc_receipt_timeout(tx_hash.to_string(), policy.max_polls))
}

/// Decode a JSON-RPC response envelope into its result.
fn decode_response(method: &str, response: RpcResponse) -> Result<Value> {
    if let Some(err) = response.error {
        return Err(Error::rpc_request_failed(
            method,
            format!("{} (code {})", err.message, err.code),
        ));
    }
    Ok(response.result.unwrap_or(Value::Null))
}

/// Transport errors name the request URL, which may embed a provider key.
fn transport_error(method: &str, err: reqwest::Error) -> Error {
    Error::rpc_request_failed(method, err.without_url().to_string())
}

pub struct RpcClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| transport_error("client", e))?;

        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Issue one JSON-RPC call and return its `result`.
    pub fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .map_err(|e| transport_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::rpc_request_failed(
                method,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        let envelope: RpcResponse = response
            .json()
            .map_err(|e| transport_error(method, e))?;

        decode_response(method, envelope)
    }

    fn call_quantity(&self, method: &str) -> Result<u64> {
        let value = self.call(method, json!([]))?;
        serde_json::from_value::<U64>(value.clone())
            .map(|quantity| quantity.to::<u64>())
            .map_err(|_| Error::rpc_request_failed(method, format!("unexpected result {}", value)))
    }

    pub fn chain_id(&self) -> Result<u64> {
        self.call_quantity("eth_chainId")
    }

    pub fn block_number(&self) -> Result<u64> {
        self.call_quantity("eth_blockNumber")
    }

    pub fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        let value = self.call("eth_getTransactionReceipt", json!([tx_hash]))?;
        decode_receipt(value)
    }
}

impl ReceiptReader for RpcClient {
    fn receipt(&self, tx_hash: B256) -> Result<Option<TransactionReceipt>> {
        self.transaction_receipt(tx_hash)
    }

    fn head(&self) -> Result<u64> {
        self.block_number()
    }
}

/// Source of confirmed receipts. Registrars depend on this rather than on
/// [`RpcClient`] directly.
pub trait ReceiptSource {
    fn wait_for_receipt(&self, tx_hash: B256, policy: &ReceiptPolicy) -> Result<TransactionReceipt>;
}

impl ReceiptSource for RpcClient {
    fn wait_for_receipt(&self, tx_hash: B256, policy: &ReceiptPolicy) -> Result<TransactionReceipt> {
        poll_receipt(self, tx_hash, policy)
    }
}

/// Receipts in node JSON form, for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use alloy_primitives::Bloom;

    pub(crate) fn receipt_json(tx_hash: B256, block: u64, success: bool, logs: &[(Address, Vec<B256>)]) -> Value {
        let logs: Vec<Value> = logs
            .iter()
            .enumerate()
            .map(|(index, (address, topics))| {
                json!({
                    "address": address,
                    "topics": topics,
                    "data": "0x",
                    "blockHash": B256::ZERO,
                    "blockNumber": format!("{:#x}", block),
                    "transactionHash": tx_hash,
                    "transactionIndex": "0x0",
                    "logIndex": format!("{:#x}", index),
                    "removed": false
                })
            })
            .collect();

        json!({
            "type": "0x2",
            "status": if success { "0x1" } else { "0x0" },
            "cumulativeGasUsed": "0x5208",
            "logs": logs,
            "logsBloom": Bloom::ZERO,
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": B256::ZERO,
            "blockNumber": format!("{:#x}", block),
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": Address::ZERO,
            "to": Address::ZERO,
            "contractAddress": null
        })
    }

    pub(crate) fn receipt(tx_hash: B256, block: u64, success: bool, logs: &[(Address, Vec<B256>)]) -> TransactionReceipt {
        serde_json::from_value(receipt_json(tx_hash, block, success, logs)).unwrap()
    }
}
