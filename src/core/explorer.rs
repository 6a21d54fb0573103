//! Block-explorer query API (Etherscan v2 shape).

use std::time::Duration;

use alloy_primitives::{Address, B256};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::utils::validation;

#[derive(Debug, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransaction {
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub contract_address: String,
}

impl ExplorerResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "1"
    }

    /// Internal transactions in the result, empty when the result is a
    /// message string (e.g. "No transactions found").
    pub fn internal_transactions(&self) -> Result<Vec<InternalTransaction>> {
        if !self.result.is_array() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.result.clone()).map_err(|e| {
            Error::internal_json(e.to_string(), Some("decode internal transactions".to_string()))
        })
    }
}

/// Address of the first contract created by an internal call.
pub fn created_contract(transactions: &[InternalTransaction]) -> Option<Address> {
    transactions
        .iter()
        .filter(|tx| tx.kind.to_ascii_lowercase().starts_with("create"))
        .find_map(|tx| validation::parse_address(&tx.contract_address))
}

/// Query up to `attempts` times until a created contract shows up.
/// Request failures end the search at once.
pub fn retry_created_contract<F>(tx_hash: B256, attempts: u32, delay: Duration, mut fetch: F) -> Result<Address>
where
    F: FnMut() -> Result<ExplorerResponse>,
{
    let attempts = attempts.max(1);
    let mut last_message = String::new();
    for attempt in 1..=attempts {
        let response = fetch()?;
        if let Some(address) = created_contract(&response.internal_transactions()?) {
            return Ok(address);
        }
        last_message = if response.is_ok() {
            "no contract creation in internal transactions".to_string()
        } else {
            response.message.clone()
        };
        tracing::debug!(target: "explorer", %tx_hash, attempt, message = %last_message, "created contract not indexed yet");
        if attempt < attempts {
            std::thread::sleep(delay);
        }
    }
    Err(Error::explorer_result_missing(tx_hash.to_string(), last_message))
}

/// Transport errors name the request URL, whose query carries the API key.
fn transport_error(err: reqwest::Error) -> Error {
    Error::explorer_request_failed(err.without_url().to_string())
}

pub struct ExplorerClient {
    client: Client,
    api_url: String,
    api_key: String,
    chain_id: u64,
}

impl ExplorerClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, chain_id: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            chain_id,
        })
    }

    /// `module=account&action=txlistinternal` for one transaction.
    pub fn internal_transactions(&self, tx_hash: B256) -> Result<ExplorerResponse> {
        let chain_id = self.chain_id.to_string();
        let tx_hash = tx_hash.to_string();
        let response = self
            .client
            .get(&self.api_url)
            .query(&[
                ("chainid", chain_id.as_str()),
                ("module", "account"),
                ("action", "txlistinternal"),
                ("txhash", tx_hash.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::explorer_request_failed(format!("HTTP {}", status.as_u16())));
        }

        response.json().map_err(transport_error)
    }

    /// Find the contract created inside `tx_hash`, retrying while the
    /// explorer has not indexed the transaction yet.
    pub fn find_created_contract(&self, tx_hash: B256, attempts: u32, delay: Duration) -> Result<Address> {
        retry_created_contract(tx_hash, attempts, delay, || self.internal_transactions(tx_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    use std::cell::Cell;

    const FORWARDER: Address = address!("586e0ead7c5fd5ecd6f5d2be2bc8ab7f8afd7c1e");
    const TX: B256 = B256::repeat_byte(0x42);

    fn response(json: &str) -> ExplorerResponse {
        serde_json::from_str(json).unwrap()
    }

    fn not_indexed() -> ExplorerResponse {
        response(r#"{"status":"0","message":"No transactions found","result":[]}"#)
    }

    fn indexed() -> ExplorerResponse {
        response(
            r#"{"status":"1","message":"OK","result":[
                {"type":"create","contractAddress":"0x586E0EaD7C5Fd5eCd6f5D2bE2Bc8Ab7F8aFd7c1e"}
            ]}"#,
        )
    }

    #[test]
    fn finds_created_forwarder() {
        let resp = response(
            r#"{"status":"1","message":"OK","result":[
                {"type":"call","contractAddress":"","to":"0x1"},
                {"type":"create","contractAddress":"0x586E0EaD7C5Fd5eCd6f5D2bE2Bc8Ab7F8aFd7c1e"}
            ]}"#,
        );
        assert!(resp.is_ok());
        let txs = resp.internal_transactions().unwrap();
        assert_eq!(created_contract(&txs), Some(FORWARDER));
    }

    #[test]
    fn create2_counts_as_creation() {
        let resp = response(
            r#"{"status":"1","message":"OK","result":[
                {"type":"CREATE2","contractAddress":"0x586E0EaD7C5Fd5eCd6f5D2bE2Bc8Ab7F8aFd7c1e"}
            ]}"#,
        );
        assert!(created_contract(&resp.internal_transactions().unwrap()).is_some());
    }

    #[test]
    fn no_transactions_found_is_empty() {
        let resp = response(r#"{"status":"0","message":"No transactions found","result":[]}"#);
        assert!(!resp.is_ok());
        assert!(created_contract(&resp.internal_transactions().unwrap()).is_none());
    }

    #[test]
    fn string_result_is_empty() {
        let resp = response(r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#);
        assert!(resp.internal_transactions().unwrap().is_empty());
    }

    #[test]
    fn calls_without_creation_yield_none() {
        let resp = response(
            r#"{"status":"1","message":"OK","result":[{"type":"call","contractAddress":""}]}"#,
        );
        assert!(created_contract(&resp.internal_transactions().unwrap()).is_none());
    }

    #[test]
    fn retry_stops_once_the_creation_is_indexed() {
        let calls = Cell::new(0);
        let found = retry_created_contract(TX, 5, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            Ok(if calls.get() < 3 { not_indexed() } else { indexed() })
        })
        .unwrap();
        assert_eq!(found, FORWARDER);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_gives_up_after_attempts() {
        let calls = Cell::new(0);
        let err = retry_created_contract(TX, 2, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            Ok(not_indexed())
        })
        .unwrap_err();
        assert_eq!(err.code.as_str(), "explorer.result_missing");
        assert_eq!(err.details["message"], "No transactions found");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn retry_stops_on_request_failure() {
        let calls = Cell::new(0);
        let err = retry_created_contract(TX, 4, Duration::from_millis(0), || {
            calls.set(calls.get() + 1);
            Err(Error::explorer_request_failed("HTTP 502"))
        })
        .unwrap_err();
        assert_eq!(err.code.as_str(), "explorer.request_failed");
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn transport_errors_do_not_leak_the_api_key() {
        let client = ExplorerClient::new("http://127.0.0.1:1/api", "SUPERSECRETKEY", 11155111).unwrap();
        let err = client.internal_transactions(TX).unwrap_err();
        assert_eq!(err.code.as_str(), "explorer.request_failed");
        assert!(!err.message.contains("SUPERSECRETKEY"));
        assert!(!err.details.to_string().contains("SUPERSECRETKEY"));
    }
}
