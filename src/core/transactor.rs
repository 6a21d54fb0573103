//! Contract calls through Foundry's `cast`.
//!
//! `cast` signs and submits transactions against the configured RPC
//! endpoint; receipts are then awaited through a [`ReceiptSource`].

use alloy_primitives::{Address, B256};

use crate::error::{Error, Result};
use crate::rpc::{ReceiptPolicy, ReceiptSource, TransactionReceipt};
use crate::runner::CommandRunner;
use crate::utils::{parser, validation};

pub struct Transactor<'a> {
    runner: &'a dyn CommandRunner,
    receipts: &'a dyn ReceiptSource,
    cast: String,
    rpc_url: String,
    private_key: String,
    policy: ReceiptPolicy,
}

impl<'a> Transactor<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        receipts: &'a dyn ReceiptSource,
        cast: impl Into<String>,
        rpc_url: impl Into<String>,
        private_key: impl Into<String>,
        policy: ReceiptPolicy,
    ) -> Self {
        Self {
            runner,
            receipts,
            cast: cast.into(),
            rpc_url: rpc_url.into(),
            private_key: private_key.into(),
            policy,
        }
    }

    fn cast(&self, args: Vec<String>) -> Result<String> {
        let output = self.runner.exec(&self.cast, &args)?;
        Ok(output.stdout.trim().to_string())
    }

    /// Argument vector for `cast send --async`.
    pub fn send_args(&self, to: Address, signature: &str, args: &[String]) -> Vec<String> {
        let mut argv = vec![
            "send".to_string(),
            "--async".to_string(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            "--private-key".to_string(),
            self.private_key.clone(),
            to.to_string(),
            signature.to_string(),
        ];
        argv.extend(args.iter().cloned());
        argv
    }

    /// Sign and broadcast a call; returns the transaction hash.
    pub fn submit(&self, to: Address, signature: &str, args: &[String]) -> Result<B256> {
        let output = self.cast(self.send_args(to, signature, args))?;
        parser::last_hex_token(&output)
            .and_then(|token| token.parse::<B256>().ok())
            .ok_or_else(|| {
                Error::internal_unexpected(format!(
                    "cast send for {} returned no transaction hash: {}",
                    signature, output
                ))
            })
    }

    /// Submit a call and wait for its confirmed, successful receipt.
    pub fn send(&self, to: Address, signature: &str, args: &[String]) -> Result<TransactionReceipt> {
        let tx_hash = self.submit(to, signature, args)?;
        tracing::info!(target: "tx", %tx_hash, %to, signature, "submitted");
        let receipt = self.receipts.wait_for_receipt(tx_hash, &self.policy)?;
        tracing::info!(target: "tx", %tx_hash, block = receipt.block_number, "confirmed");
        Ok(receipt)
    }

    /// Read-only call; `signature` includes the return types, e.g.
    /// `getForwarder(uint256)(address)`.
    pub fn call(&self, to: Address, signature: &str, args: &[String]) -> Result<String> {
        let mut argv = vec![
            "call".to_string(),
            "--rpc-url".to_string(),
            self.rpc_url.clone(),
            to.to_string(),
            signature.to_string(),
        ];
        argv.extend(args.iter().cloned());
        self.cast(argv)
    }

    /// Address of the signing key.
    pub fn sender(&self) -> Result<Address> {
        let output = self.cast(vec![
            "wallet".to_string(),
            "address".to_string(),
            "--private-key".to_string(),
            self.private_key.clone(),
        ])?;
        let address = parser::last_hex_token(&output).unwrap_or_default();
        validation::require_address(&address, "sender")
    }
}
