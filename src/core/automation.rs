//! Upkeep registration with the automation registrar.
//!
//! Sequence: approve LINK to the registrar, `registerUpkeep`, read the upkeep
//! id from the registry log, resolve the forwarder, then point the deployed
//! contract at it.

use alloy_primitives::aliases::U96;
use alloy_primitives::{keccak256, Address, B256};
use serde::Serialize;

use crate::config::{keys, parsed_or, Settings};
use crate::env_store::EnvStore;
use crate::error::{Error, Result};
use crate::explorer::ExplorerClient;
use crate::rpc;
use crate::transactor::Transactor;
use crate::utils::{parser, validation};

const APPROVE: &str = "approve(address,uint256)";
const REGISTER_UPKEEP: &str =
    "registerUpkeep((string,bytes,address,uint32,address,uint8,bytes,bytes,bytes,uint96))";
const UPKEEP_REGISTERED: &str = "UpkeepRegistered(uint256,uint32,address)";
const GET_FORWARDER: &str = "getForwarder(uint256)(address)";

/// Arguments of `registerUpkeep`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationParams {
    pub name: String,
    pub encrypted_email: String,
    pub upkeep_contract: Address,
    pub gas_limit: u32,
    pub admin_address: Address,
    pub trigger_type: u8,
    pub check_data: String,
    pub trigger_config: String,
    pub offchain_config: String,
    pub amount: U96,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationOutcome {
    /// Decimal, as the registry reports it.
    pub upkeep_id: String,
    pub registration_tx: B256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forwarder: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setter_tx: Option<B256>,
}

fn bytes_literal(value: Option<&str>, field: &str) -> Result<String> {
    let raw = value.map(str::trim).unwrap_or("");
    if raw.is_empty() || raw == "0x" {
        return Ok("0x".to_string());
    }
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::config_invalid_value(
            field,
            Some(raw.to_string()),
            "expected 0x-prefixed hex bytes",
        ));
    }
    Ok(format!("0x{}", digits))
}

/// Parse a token amount in the smallest unit; it must fit `uint96`.
pub fn parse_amount(raw: &str, field: &str) -> Result<U96> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::config_invalid_value(
            field,
            Some(raw.to_string()),
            "expected an integer amount",
        ));
    }
    trimmed.parse::<U96>().map_err(|_| {
        Error::config_invalid_value(field, Some(raw.to_string()), "amount exceeds uint96")
    })
}

impl RegistrationParams {
    /// Build params from env values, falling back to deploywire.toml.
    /// The admin defaults to the signing address.
    pub fn resolve(
        settings: &Settings,
        store: &EnvStore,
        contract: Address,
        tx: &Transactor<'_>,
    ) -> Result<Self> {
        let defaults = &settings.config.automation;

        let admin_address = match store.get(keys::UPKEEP_ADMIN_ADDRESS) {
            Some(admin) => validation::require_address(admin, keys::UPKEEP_ADMIN_ADDRESS)?,
            None => tx.sender()?,
        };

        let trigger_type = parsed_or(store, keys::UPKEEP_TRIGGER_TYPE, defaults.trigger_type)?;
        if trigger_type > 1 {
            return Err(Error::config_invalid_value(
                keys::UPKEEP_TRIGGER_TYPE,
                Some(trigger_type.to_string()),
                "expected 0 (conditional) or 1 (log)",
            ));
        }

        Ok(Self {
            name: store.get_or(keys::UPKEEP_NAME, &defaults.upkeep_name),
            encrypted_email: "0x".to_string(),
            upkeep_contract: contract,
            gas_limit: parsed_or(store, keys::UPKEEP_GAS_LIMIT, defaults.gas_limit)?,
            admin_address,
            trigger_type,
            check_data: bytes_literal(store.get(keys::UPKEEP_CHECK_DATA), keys::UPKEEP_CHECK_DATA)?,
            trigger_config: bytes_literal(
                store.get(keys::UPKEEP_TRIGGER_CONFIG),
                keys::UPKEEP_TRIGGER_CONFIG,
            )?,
            offchain_config: "0x".to_string(),
            amount: parse_amount(
                &store.get_or(keys::UPKEEP_FUNDING_AMOUNT, &defaults.funding_amount),
                keys::UPKEEP_FUNDING_AMOUNT,
            )?,
        })
    }

    /// The struct argument as a `cast` tuple literal.
    pub fn tuple_literal(&self) -> Result<String> {
        if self.name.contains('"') || self.name.contains('\\') {
            return Err(Error::config_invalid_value(
                keys::UPKEEP_NAME,
                Some(self.name.clone()),
                "upkeep name must not contain quotes or backslashes",
            ));
        }
        Ok(format!(
            "(\"{}\",{},{},{},{},{},{},{},{},{})",
            self.name,
            self.encrypted_email,
            self.upkeep_contract,
            self.gas_limit,
            self.admin_address,
            self.trigger_type,
            self.check_data,
            self.trigger_config,
            self.offchain_config,
            self.amount
        ))
    }
}

/// Register `contract` as an Upkeep and persist the id and forwarder.
pub fn register(
    settings: &Settings,
    store: &mut EnvStore,
    tx: &Transactor<'_>,
    explorer: Option<&ExplorerClient>,
    contract: Address,
) -> Result<AutomationOutcome> {
    let link = validation::require_address(store.require(keys::LINK_TOKEN_ADDRESS)?, keys::LINK_TOKEN_ADDRESS)?;
    let registrar = validation::require_address(
        store.require(keys::AUTOMATION_REGISTRAR_ADDRESS)?,
        keys::AUTOMATION_REGISTRAR_ADDRESS,
    )?;

    let params = RegistrationParams::resolve(settings, store, contract, tx)?;
    let tuple = params.tuple_literal()?;

    log_status!("automation", "Approving {} juels for registrar {}", params.amount, registrar);
    tx.send(link, APPROVE, &[registrar.to_string(), params.amount.to_string()])?;

    log_status!("automation", "Registering upkeep '{}' for {}", params.name, contract);
    let receipt = tx.send(registrar, REGISTER_UPKEEP, &[tuple])?;
    let registration_tx = receipt.transaction_hash;

    let upkeep_id = rpc::find_log(&receipt, keccak256(UPKEEP_REGISTERED), None)
        .and_then(|log| rpc::indexed_uint(log, 1))
        .map(|id| id.to_string())
        .ok_or_else(|| Error::registration_log_missing(UPKEEP_REGISTERED, registration_tx.to_string()))?;
    store.set(keys::UPKEEP_ID, &upkeep_id)?;
    log_status!("automation", "Upkeep {} registered", upkeep_id);

    let forwarder = lookup_forwarder(settings, store, tx, explorer, registration_tx, &upkeep_id)?;
    let mut setter_tx = None;
    match forwarder {
        Some(address) => {
            store.set(keys::UPKEEP_FORWARDER_ADDRESS, &address.to_string())?;
            log_status!("automation", "Forwarder {}", address);

            let setter = settings.config.automation.forwarder_setter.trim();
            if !setter.is_empty() {
                let receipt = tx.send(contract, setter, &[address.to_string()])?;
                setter_tx = Some(receipt.transaction_hash);
            }
        }
        None => {
            tracing::warn!(
                target: "automation",
                "no explorer API key or registry address configured; forwarder not resolved"
            );
        }
    }

    Ok(AutomationOutcome {
        upkeep_id,
        registration_tx,
        forwarder,
        setter_tx,
    })
}

/// Explorer lookup when a client is available, with the registry view call
/// as fallback.
fn lookup_forwarder(
    settings: &Settings,
    store: &EnvStore,
    tx: &Transactor<'_>,
    explorer: Option<&ExplorerClient>,
    registration_tx: B256,
    upkeep_id: &str,
) -> Result<Option<Address>> {
    let registry = store.get(keys::AUTOMATION_REGISTRY_ADDRESS);

    if let Some(explorer) = explorer {
        let (attempts, delay) = settings.explorer_retry();
        match explorer.find_created_contract(registration_tx, attempts, delay) {
            Ok(address) => return Ok(Some(address)),
            Err(err) if registry.is_some() => {
                tracing::warn!(
                    target: "automation",
                    code = err.code.as_str(),
                    "{}; asking the registry instead",
                    err.message
                );
            }
            Err(err) => return Err(err),
        }
    }

    let Some(registry) = registry else {
        return Ok(None);
    };
    let registry = validation::require_address(registry, keys::AUTOMATION_REGISTRY_ADDRESS)?;
    let output = tx.call(registry, GET_FORWARDER, &[upkeep_id.to_string()])?;
    let forwarder = parser::last_hex_token(&output).unwrap_or_default();
    validation::require_address(&forwarder, "forwarder").map(Some)
}
