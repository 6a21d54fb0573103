//! Deploy → persist → optional registrations.
//!
//! Every stage lands in the [`PipelineReport`]; a failed registrar does not
//! stop the other one, a failed deploy skips both.

use alloy_primitives::Address;
use serde::Serialize;

use crate::automation;
use crate::config::{keys, parsed_or, Settings};
use crate::deploy;
use crate::env_store::EnvStore;
use crate::error::{Error, Result};
use crate::explorer::ExplorerClient;
use crate::functions;
use crate::output::{PipelineSummary, StageOutcome, StageStatus};
use crate::rpc::{ReceiptSource, RpcClient};
use crate::runner::CommandRunner;
use crate::transactor::Transactor;
use crate::utils::validation;

pub const STAGE_DEPLOY: &str = "deploy";
pub const STAGE_AUTOMATION: &str = "automation";
pub const STAGE_FUNCTIONS: &str = "functions";

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub automation: bool,
    pub functions: bool,
}

impl PipelineOptions {
    fn any_registrar(&self) -> bool {
        self.automation || self.functions
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    pub stages: Vec<StageOutcome>,
    pub summary: PipelineSummary,
}

impl PipelineReport {
    fn new(contract_address: Option<String>, stages: Vec<StageOutcome>) -> Self {
        let summary = PipelineSummary::from_stages(&stages);
        Self {
            contract_address,
            stages,
            summary,
        }
    }

    pub fn success(&self) -> bool {
        self.summary.failed == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    pub fn stage(&self, name: &str) -> Option<&StageOutcome> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// Network handles the registrars need.
pub struct Connection {
    pub receipts: Box<dyn ReceiptSource>,
    pub explorer: Option<ExplorerClient>,
}

impl Connection {
    /// Connect to `RPC_URL`, plus the block explorer when `EXPLORER_API_KEY` is set.
    /// The chain id comes from `CHAIN_ID` or, failing that, `eth_chainId`.
    pub fn open(settings: &Settings, store: &EnvStore) -> Result<Self> {
        let rpc = RpcClient::new(store.require(keys::RPC_URL)?)?;

        let explorer = match store.get(keys::EXPLORER_API_KEY) {
            Some(api_key) => {
                let chain_id = match store.get(keys::CHAIN_ID) {
                    Some(_) => parsed_or(store, keys::CHAIN_ID, 0u64)?,
                    None => rpc.chain_id()?,
                };
                Some(ExplorerClient::new(
                    settings.explorer_api_url(store),
                    api_key,
                    chain_id,
                )?)
            }
            None => None,
        };

        Ok(Self {
            receipts: Box::new(rpc),
            explorer,
        })
    }
}

/// Run the full pipeline. `connect` is called once, after a successful
/// deploy, and only if a registrar was requested.
pub fn run<C>(
    settings: &Settings,
    store: &mut EnvStore,
    runner: &dyn CommandRunner,
    options: PipelineOptions,
    connect: C,
) -> PipelineReport
where
    C: FnOnce(&Settings, &EnvStore) -> Result<Connection>,
{
    let mut stages = Vec::with_capacity(3);

    let (address, contract) = match deploy::run(settings, store, runner) {
        Ok(record) => {
            stages.push(StageOutcome::succeeded(STAGE_DEPLOY, &record));
            (record.address, record.contract)
        }
        Err(err) => {
            tracing::error!(target: "deploy", code = err.code.as_str(), "{}", err.message);
            stages.push(StageOutcome::failed(STAGE_DEPLOY, &err));
            for stage in [STAGE_AUTOMATION, STAGE_FUNCTIONS] {
                stages.push(StageOutcome::skipped(stage, "deploy failed"));
            }
            return PipelineReport::new(None, stages);
        }
    };

    stages.extend(registrar_stages(settings, store, runner, options, connect, contract));
    PipelineReport::new(Some(address), stages)
}

/// Run the requested registrars against the address already stored under
/// the configured key.
pub fn run_registrars<C>(
    settings: &Settings,
    store: &mut EnvStore,
    runner: &dyn CommandRunner,
    options: PipelineOptions,
    connect: C,
) -> Result<PipelineReport>
where
    C: FnOnce(&Settings, &EnvStore) -> Result<Connection>,
{
    let key = settings.address_key();
    let contract = validation::require_address(store.require(key)?, key)?;
    let mut stages = vec![StageOutcome::skipped(STAGE_DEPLOY, "using stored address")];
    stages.extend(registrar_stages(settings, store, runner, options, connect, contract));
    Ok(PipelineReport::new(Some(contract.to_string()), stages))
}

fn registrar_stages<C>(
    settings: &Settings,
    store: &mut EnvStore,
    runner: &dyn CommandRunner,
    options: PipelineOptions,
    connect: C,
    contract: Address,
) -> Vec<StageOutcome>
where
    C: FnOnce(&Settings, &EnvStore) -> Result<Connection>,
{
    let selected = [
        (STAGE_AUTOMATION, options.automation),
        (STAGE_FUNCTIONS, options.functions),
    ];

    if !options.any_registrar() {
        return selected
            .iter()
            .map(|(stage, _)| StageOutcome::skipped(stage, "not requested"))
            .collect();
    }

    let prepared = connect(settings, &*store).and_then(|conn| {
        let rpc_url = store.require(keys::RPC_URL)?.to_string();
        let private_key = store.require(keys::PRIVATE_KEY)?.to_string();
        Ok((conn, rpc_url, private_key))
    });
    let (conn, rpc_url, private_key) = match prepared {
        Ok(parts) => parts,
        Err(err) => {
            tracing::error!(target: "pipeline", code = err.code.as_str(), "{}", err.message);
            return selected
                .iter()
                .map(|(stage, wanted)| {
                    if *wanted {
                        StageOutcome::failed(stage, &err)
                    } else {
                        StageOutcome::skipped(stage, "not requested")
                    }
                })
                .collect();
        }
    };

    let tx = Transactor::new(
        runner,
        &*conn.receipts,
        settings.cast_program(),
        rpc_url,
        private_key,
        settings.receipt_policy(),
    );

    let mut stages = Vec::with_capacity(2);

    stages.push(if options.automation {
        outcome(
            STAGE_AUTOMATION,
            automation::register(settings, store, &tx, conn.explorer.as_ref(), contract),
        )
    } else {
        StageOutcome::skipped(STAGE_AUTOMATION, "not requested")
    });

    stages.push(if options.functions {
        outcome(STAGE_FUNCTIONS, functions::register(settings, store, &tx, contract))
    } else {
        StageOutcome::skipped(STAGE_FUNCTIONS, "not requested")
    });

    stages
}

fn outcome<T: Serialize>(stage: &str, result: Result<T>) -> StageOutcome {
    match result {
        Ok(values) => StageOutcome::succeeded(stage, &values),
        Err(err) => {
            tracing::error!(target: "pipeline", stage, code = err.code.as_str(), "{}", err.message);
            StageOutcome::failed(stage, &err)
        }
    }
}

/// Error for a report that contains failures, used by the CLI envelope.
pub fn report_error(report: &PipelineReport) -> Option<Error> {
    let failed: Vec<&str> = report
        .stages
        .iter()
        .filter(|s| s.status == StageStatus::Failed)
        .map(|s| s.stage.as_str())
        .collect();
    if failed.is_empty() {
        return None;
    }
    let details = serde_json::to_value(report).unwrap_or(serde_json::Value::Null);
    Some(Error::pipeline_stage_failed(&failed, details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::DeploywireConfig;
    use crate::rpc::{ReceiptPolicy, TransactionReceipt};
    use crate::utils::command::CapturedOutput;
    use alloy_primitives::B256;
    use std::fs;
    use std::path::Path;

    const ADDRESS: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    struct DeployOnly(&'static str);

    impl CommandRunner for DeployOnly {
        fn shell(&self, _: &str, _: Option<&Path>, _: &[(String, String)]) -> Result<CapturedOutput> {
            Ok(CapturedOutput::new(self.0, ""))
        }

        fn exec(&self, program: &str, _: &[String]) -> Result<CapturedOutput> {
            Err(Error::internal_unexpected(format!("{} unavailable", program)))
        }
    }

    struct NeverMined;

    impl ReceiptSource for NeverMined {
        fn wait_for_receipt(&self, tx_hash: B256, _: &ReceiptPolicy) -> Result<TransactionReceipt> {
            Err(Error::rpc_receipt_timeout(tx_hash.to_string(), 1))
        }
    }

    fn offline(_: &Settings, _: &EnvStore) -> Result<Connection> {
        Ok(Connection {
            receipts: Box::new(NeverMined),
            explorer: None,
        })
    }

    fn store(dir: &tempfile::TempDir, content: &str) -> EnvStore {
        let path = dir.path().join(".env");
        fs::write(&path, content).unwrap();
        EnvStore::load_isolated(path).unwrap()
    }

    #[test]
    fn deploy_only_succeeds_and_skips_registrars() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = store(&dir, "");
        let settings = Settings::new(DeploywireConfig::default());
        let runner = DeployOnly("Contract Address: 0x5FbDB2315678afecb367f032d93F642f64180aa3");

        let report = run(&settings, &mut env, &runner, PipelineOptions::default(), |_, _| {
            panic!("no registrar requested")
        });

        assert!(report.success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.contract_address.as_deref(), Some(ADDRESS));
        assert_eq!(report.summary.succeeded, 1);
        assert_eq!(report.summary.skipped, 2);
    }

    #[test]
    fn deploy_failure_skips_registrars() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = store(&dir, "");
        let settings = Settings::new(DeploywireConfig::default());
        let runner = DeployOnly("nothing useful");
        let options = PipelineOptions {
            automation: true,
            functions: true,
        };

        let report = run(&settings, &mut env, &runner, options, offline);

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.stage(STAGE_DEPLOY).unwrap().status, StageStatus::Failed);
        assert_eq!(report.stage(STAGE_AUTOMATION).unwrap().status, StageStatus::Skipped);
        assert_eq!(report.stage(STAGE_FUNCTIONS).unwrap().status, StageStatus::Skipped);
        assert!(report_error(&report).is_some());
    }

    #[test]
    fn registrar_failures_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = store(&dir, "RPC_URL=http://localhost:8545\nPRIVATE_KEY=0xkey\n");
        let settings = Settings::new(DeploywireConfig::default());
        let runner = DeployOnly("Deployed to: 0x5FbDB2315678afecb367f032d93F642f64180aa3");
        let options = PipelineOptions {
            automation: true,
            functions: true,
        };

        let report = run(&settings, &mut env, &runner, options, offline);

        // Both registrars ran and failed on their own missing keys.
        let automation = report.stage(STAGE_AUTOMATION).unwrap();
        let functions = report.stage(STAGE_FUNCTIONS).unwrap();
        assert_eq!(automation.status, StageStatus::Failed);
        assert_eq!(functions.status, StageStatus::Failed);
        assert_eq!(automation.error.as_ref().unwrap().code, "config.missing_key");
        assert_eq!(report.stage(STAGE_DEPLOY).unwrap().status, StageStatus::Succeeded);
        assert_eq!(env.get("CONTRACT_ADDRESS"), Some(ADDRESS));
    }

    #[test]
    fn connection_failure_fails_only_requested_registrars() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = store(&dir, "");
        let settings = Settings::new(DeploywireConfig::default());
        let runner = DeployOnly("Deployed to: 0x5FbDB2315678afecb367f032d93F642f64180aa3");
        let options = PipelineOptions {
            automation: false,
            functions: true,
        };

        let report = run(&settings, &mut env, &runner, options, Connection::open);

        assert_eq!(report.stage(STAGE_AUTOMATION).unwrap().status, StageStatus::Skipped);
        let functions = report.stage(STAGE_FUNCTIONS).unwrap();
        assert_eq!(functions.status, StageStatus::Failed);
        assert_eq!(functions.error.as_ref().unwrap().details["key"], "RPC_URL");
    }

    #[test]
    fn run_registrars_requires_stored_address() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = store(&dir, "");
        let settings = Settings::new(DeploywireConfig::default());
        let options = PipelineOptions {
            automation: true,
            functions: false,
        };

        let err = run_registrars(&settings, &mut env, &DeployOnly(""), options, offline).unwrap_err();
        assert_eq!(err.code.as_str(), "config.missing_key");
    }
}
