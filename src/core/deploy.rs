//! Deploy stage: run the deploy command, extract the address, persist it.

use alloy_primitives::Address;
use serde::Serialize;

use crate::config::Settings;
use crate::env_store::EnvStore;
use crate::error::{Error, Result};
use crate::extract;
use crate::runner::CommandRunner;
use crate::utils::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// As extracted and persisted.
    pub address: String,
    #[serde(skip)]
    pub contract: Address,
    pub key: String,
    pub rule: String,
}

/// Deploy with the configured command and store the contract address under
/// the configured key.
pub fn run(settings: &Settings, store: &mut EnvStore, runner: &dyn CommandRunner) -> Result<DeploymentRecord> {
    let deploy = &settings.config.deploy;
    let rules = extract::rules_with(&deploy.patterns)?;
    let working_dir = settings.working_dir();

    log_status!("deploy", "Running deploy command");
    let output = runner.shell(&deploy.command, working_dir.as_deref(), &store.file_env())?;
    let text = output.combined();

    let extraction = extract::extract_with(&rules, &text).ok_or_else(|| {
        Error::deploy_address_not_found(rules.iter().map(|r| r.name.clone()).collect())
    })?;
    tracing::debug!(target: "deploy", rule = %extraction.rule, address = %extraction.address, "address extracted");

    let contract = validation::parse_address(&extraction.address)
        .ok_or_else(|| Error::deploy_invalid_address(&extraction.address, &extraction.rule))?;

    let key = settings.address_key().to_string();
    store.set(&key, &extraction.address)?;
    log_status!("deploy", "{}={}", key, extraction.address);

    Ok(DeploymentRecord {
        address: extraction.address,
        contract,
        key,
        rule: extraction.rule,
    })
}
