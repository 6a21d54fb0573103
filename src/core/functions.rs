//! Functions (DON) subscription setup for the deployed consumer.

use alloy_primitives::aliases::U96;
use alloy_primitives::{keccak256, Address, B256};
use serde::Serialize;

use crate::automation::parse_amount;
use crate::config::{keys, Settings};
use crate::env_store::EnvStore;
use crate::error::{Error, Result};
use crate::rpc;
use crate::transactor::Transactor;
use crate::utils::validation;

const CREATE_SUBSCRIPTION: &str = "createSubscription()";
const SUBSCRIPTION_CREATED: &str = "SubscriptionCreated(uint64,address)";
const TRANSFER_AND_CALL: &str = "transferAndCall(address,uint256,bytes)";
const ADD_CONSUMER: &str = "addConsumer(uint64,address)";

/// What the functions stage will do for one consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub router: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<u64>,
    pub funding_amount: U96,
    pub consumer: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionsOutcome {
    pub subscription_id: u64,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding_tx: Option<B256>,
    pub consumer_tx: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setter_tx: Option<B256>,
}

impl SubscriptionPlan {
    pub fn resolve(settings: &Settings, store: &EnvStore, consumer: Address) -> Result<Self> {
        let router = validation::require_address(
            store.require(keys::FUNCTIONS_ROUTER_ADDRESS)?,
            keys::FUNCTIONS_ROUTER_ADDRESS,
        )?;

        let subscription_id = match store.get(keys::FUNCTIONS_SUBSCRIPTION_ID) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                Error::config_invalid_value(
                    keys::FUNCTIONS_SUBSCRIPTION_ID,
                    Some(raw.to_string()),
                    "expected a uint64 subscription id",
                )
            })?),
            None => None,
        };

        let funding_amount = parse_amount(
            &store.get_or(
                keys::FUNCTIONS_FUNDING_AMOUNT,
                &settings.config.functions.funding_amount,
            ),
            keys::FUNCTIONS_FUNDING_AMOUNT,
        )?;

        Ok(Self {
            router,
            subscription_id,
            funding_amount,
            consumer,
        })
    }
}

/// Subscription id from the `SubscriptionCreated` log; it must fit uint64.
fn created_subscription_id(log: &rpc::Log) -> Option<u64> {
    rpc::indexed_uint(log, 1).and_then(|id| u64::try_from(id).ok())
}

/// `abi.encode(uint64)`: the id left-padded to one word.
fn encode_subscription_id(id: u64) -> String {
    B256::left_padding_from(&id.to_be_bytes()).to_string()
}

/// Create (or reuse) a subscription, fund it, and add `consumer` to it.
pub fn register(
    settings: &Settings,
    store: &mut EnvStore,
    tx: &Transactor<'_>,
    consumer: Address,
) -> Result<FunctionsOutcome> {
    let plan = SubscriptionPlan::resolve(settings, store, consumer)?;

    let (subscription_id, created) = match plan.subscription_id {
        Some(id) => {
            log_status!("functions", "Reusing subscription {}", id);
            (id, false)
        }
        None => {
            log_status!("functions", "Creating subscription on router {}", plan.router);
            let receipt = tx.send(plan.router, CREATE_SUBSCRIPTION, &[])?;
            let id = rpc::find_log(&receipt, keccak256(SUBSCRIPTION_CREATED), Some(plan.router))
                .and_then(created_subscription_id)
                .ok_or_else(|| {
                    Error::registration_log_missing(
                        SUBSCRIPTION_CREATED,
                        receipt.transaction_hash.to_string(),
                    )
                })?;
            store.set(keys::FUNCTIONS_SUBSCRIPTION_ID, &id.to_string())?;
            log_status!("functions", "Subscription {} created", id);
            (id, true)
        }
    };

    let mut funding_tx = None;
    if !plan.funding_amount.is_zero() {
        let link = validation::require_address(
            store.require(keys::LINK_TOKEN_ADDRESS)?,
            keys::LINK_TOKEN_ADDRESS,
        )?;
        log_status!("functions", "Funding subscription {} with {} juels", subscription_id, plan.funding_amount);
        let receipt = tx.send(
            link,
            TRANSFER_AND_CALL,
            &[
                plan.router.to_string(),
                plan.funding_amount.to_string(),
                encode_subscription_id(subscription_id),
            ],
        )?;
        funding_tx = Some(receipt.transaction_hash);
    }

    log_status!("functions", "Adding consumer {}", plan.consumer);
    let consumer_tx = tx
        .send(
            plan.router,
            ADD_CONSUMER,
            &[subscription_id.to_string(), plan.consumer.to_string()],
        )?
        .transaction_hash;

    let setter = settings.config.functions.consumer_setter.trim();
    let setter_tx = if setter.is_empty() {
        None
    } else {
        let receipt = tx.send(plan.consumer, setter, &[subscription_id.to_string()])?;
        Some(receipt.transaction_hash)
    };

    Ok(FunctionsOutcome {
        subscription_id,
        created,
        funding_tx,
        consumer_tx,
        setter_tx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DeploywireConfig;
    use crate::rpc::fixtures;
    use crate::rpc::{ReceiptPolicy, ReceiptSource, TransactionReceipt};
    use crate::runner::CommandRunner;
    use crate::utils::command::CapturedOutput;
    use alloy_primitives::address;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    const CONSUMER: Address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
    const LINK: Address = address!("779877A7B0D9E8603169DdbD7836e478b4624789");
    const ROUTER: Address = address!("b83E47C2bC239B3bf370bc41e1459A34b41238D0");
    const ENCODED: &str = "0x000000000000000000000000000000000000000000000000000000000000000c";

    fn word(n: u64) -> B256 {
        B256::left_padding_from(&n.to_be_bytes())
    }

    struct CastDouble {
        sends: RefCell<Vec<(String, String, Vec<String>)>>,
    }

    impl CastDouble {
        fn new() -> Self {
            Self {
                sends: RefCell::new(Vec::new()),
            }
        }

        fn signatures(&self) -> Vec<String> {
            self.sends.borrow().iter().map(|(_, sig, _)| sig.clone()).collect()
        }
    }

    impl CommandRunner for CastDouble {
        fn shell(&self, _: &str, _: Option<&Path>, _: &[(String, String)]) -> Result<CapturedOutput> {
            unreachable!()
        }

        fn exec(&self, _: &str, args: &[String]) -> Result<CapturedOutput> {
            let stdout = match args[0].as_str() {
                "send" => {
                    let mut sends = self.sends.borrow_mut();
                    sends.push((args[6].clone(), args[7].clone(), args[8..].to_vec()));
                    word(sends.len() as u64).to_string()
                }
                other => panic!("unexpected cast {}", other),
            };
            Ok(CapturedOutput::new(stdout, ""))
        }
    }

    /// The first transaction emits `SubscriptionCreated(12, …)` from the router.
    struct Mined;

    impl ReceiptSource for Mined {
        fn wait_for_receipt(&self, tx_hash: B256, _: &ReceiptPolicy) -> Result<TransactionReceipt> {
            let logs = if tx_hash == word(1) {
                vec![(ROUTER, vec![keccak256(SUBSCRIPTION_CREATED), word(12)])]
            } else {
                Vec::new()
            };
            Ok(fixtures::receipt(tx_hash, 3, true, &logs))
        }
    }

    fn policy() -> ReceiptPolicy {
        ReceiptPolicy {
            confirmations: 1,
            poll_interval: Duration::from_millis(0),
            max_polls: 1,
        }
    }

    fn store_with(dir: &tempfile::TempDir, content: &str) -> EnvStore {
        let path = dir.path().join(".env");
        fs::write(&path, content).unwrap();
        EnvStore::load_isolated(path).unwrap()
    }

    #[test]
    fn creates_funds_and_adds_consumer() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(
            &dir,
            &format!("FUNCTIONS_ROUTER_ADDRESS={}\nLINK_TOKEN_ADDRESS={}\n", ROUTER, LINK),
        );
        let runner = CastDouble::new();
        let tx = Transactor::new(&runner, &Mined, "cast", "http://rpc", "0xkey", policy());
        let settings = Settings::new(DeploywireConfig::default());

        let outcome = register(&settings, &mut store, &tx, CONSUMER).unwrap();

        assert_eq!(outcome.subscription_id, 12);
        assert!(outcome.created);
        assert_eq!(outcome.funding_tx, Some(word(2)));
        assert!(outcome.setter_tx.is_none());
        assert_eq!(
            runner.signatures(),
            vec![CREATE_SUBSCRIPTION, TRANSFER_AND_CALL, ADD_CONSUMER]
        );

        let sends = runner.sends.borrow();
        assert_eq!(sends[1].0, LINK.to_string());
        assert_eq!(
            sends[1].2,
            vec![ROUTER.to_string(), "2000000000000000000".to_string(), ENCODED.to_string()]
        );
        assert_eq!(sends[2].2, vec!["12".to_string(), CONSUMER.to_string()]);

        assert_eq!(store.get(keys::FUNCTIONS_SUBSCRIPTION_ID), Some("12"));
        let written = fs::read_to_string(store.path()).unwrap();
        assert!(written.contains("FUNCTIONS_SUBSCRIPTION_ID=12"));
    }

    #[test]
    fn reuses_existing_subscription_without_funding() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(
            &dir,
            &format!(
                "FUNCTIONS_ROUTER_ADDRESS={}\nFUNCTIONS_SUBSCRIPTION_ID=42\nFUNCTIONS_FUNDING_AMOUNT=0\n",
                ROUTER
            ),
        );
        let runner = CastDouble::new();
        let tx = Transactor::new(&runner, &Mined, "cast", "http://rpc", "0xkey", policy());
        let mut config = DeploywireConfig::default();
        config.functions.consumer_setter = "setSubscriptionId(uint64)".to_string();
        let settings = Settings::new(config);

        let outcome = register(&settings, &mut store, &tx, CONSUMER).unwrap();

        assert_eq!(outcome.subscription_id, 42);
        assert!(!outcome.created);
        assert!(outcome.funding_tx.is_none());
        assert!(outcome.setter_tx.is_some());
        assert_eq!(runner.signatures(), vec![ADD_CONSUMER, "setSubscriptionId(uint64)"]);
    }

    #[test]
    fn creation_log_from_another_emitter_is_ignored() {
        struct Spoofed;

        impl ReceiptSource for Spoofed {
            fn wait_for_receipt(&self, tx_hash: B256, _: &ReceiptPolicy) -> Result<TransactionReceipt> {
                let logs = vec![(LINK, vec![keccak256(SUBSCRIPTION_CREATED), word(12)])];
                Ok(fixtures::receipt(tx_hash, 3, true, &logs))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(&dir, &format!("FUNCTIONS_ROUTER_ADDRESS={}\n", ROUTER));
        let runner = CastDouble::new();
        let tx = Transactor::new(&runner, &Spoofed, "cast", "http://rpc", "0xkey", policy());
        let settings = Settings::new(DeploywireConfig::default());

        let err = register(&settings, &mut store, &tx, CONSUMER).unwrap_err();
        assert_eq!(err.code.as_str(), "registration.log_missing");
        assert_eq!(store.get(keys::FUNCTIONS_SUBSCRIPTION_ID), None);
    }

    #[test]
    fn missing_router_fails_before_any_call() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = store_with(&dir, "");
        let runner = CastDouble::new();
        let tx = Transactor::new(&runner, &Mined, "cast", "http://rpc", "0xkey", policy());
        let settings = Settings::new(DeploywireConfig::default());

        let err = register(&settings, &mut store, &tx, CONSUMER).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
        assert!(runner.sends.borrow().is_empty());
    }

    #[test]
    fn bad_subscription_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            &format!("FUNCTIONS_ROUTER_ADDRESS={}\nFUNCTIONS_SUBSCRIPTION_ID=abc\n", ROUTER),
        );
        let settings = Settings::new(DeploywireConfig::default());
        let err = SubscriptionPlan::resolve(&settings, &store, CONSUMER).unwrap_err();
        assert_eq!(err.details["key"], "FUNCTIONS_SUBSCRIPTION_ID");
    }

    #[test]
    fn created_ids_must_fit_uint64() {
        let log = |id: B256| fixtures::receipt(word(1), 3, true, &[(ROUTER, vec![keccak256(SUBSCRIPTION_CREATED), id])]);

        let small = log(word(12));
        assert_eq!(created_subscription_id(&small.inner.logs()[0]), Some(12));

        let wide = log(B256::left_padding_from(&[1, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert_eq!(created_subscription_id(&wide.inner.logs()[0]), None);
    }

    #[test]
    fn subscription_id_encodes_as_one_word() {
        assert_eq!(encode_subscription_id(12), ENCODED);
    }
}
