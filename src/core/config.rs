//! Explicit run configuration.
//!
//! [`Settings`] carries the tool defaults from deploywire.toml; values that
//! vary per network or per deployment are read from the [`EnvStore`] passed
//! alongside it. An env value overrides the file default for the same
//! parameter.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::defaults::{self, DeploywireConfig};
use crate::env_store::EnvStore;
use crate::error::{Error, Result};
use crate::paths;
use crate::rpc::ReceiptPolicy;

/// Environment keys read or written by the pipeline.
pub mod keys {
    pub const RPC_URL: &str = "RPC_URL";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const CHAIN_ID: &str = "CHAIN_ID";

    pub const EXPLORER_API_URL: &str = "EXPLORER_API_URL";
    pub const EXPLORER_API_KEY: &str = "EXPLORER_API_KEY";

    pub const LINK_TOKEN_ADDRESS: &str = "LINK_TOKEN_ADDRESS";

    pub const AUTOMATION_REGISTRAR_ADDRESS: &str = "AUTOMATION_REGISTRAR_ADDRESS";
    pub const AUTOMATION_REGISTRY_ADDRESS: &str = "AUTOMATION_REGISTRY_ADDRESS";
    pub const UPKEEP_NAME: &str = "UPKEEP_NAME";
    pub const UPKEEP_GAS_LIMIT: &str = "UPKEEP_GAS_LIMIT";
    pub const UPKEEP_ADMIN_ADDRESS: &str = "UPKEEP_ADMIN_ADDRESS";
    pub const UPKEEP_TRIGGER_TYPE: &str = "UPKEEP_TRIGGER_TYPE";
    pub const UPKEEP_FUNDING_AMOUNT: &str = "UPKEEP_FUNDING_AMOUNT";
    pub const UPKEEP_CHECK_DATA: &str = "UPKEEP_CHECK_DATA";
    pub const UPKEEP_TRIGGER_CONFIG: &str = "UPKEEP_TRIGGER_CONFIG";
    pub const UPKEEP_ID: &str = "UPKEEP_ID";
    pub const UPKEEP_FORWARDER_ADDRESS: &str = "UPKEEP_FORWARDER_ADDRESS";

    pub const FUNCTIONS_ROUTER_ADDRESS: &str = "FUNCTIONS_ROUTER_ADDRESS";
    pub const FUNCTIONS_SUBSCRIPTION_ID: &str = "FUNCTIONS_SUBSCRIPTION_ID";
    pub const FUNCTIONS_FUNDING_AMOUNT: &str = "FUNCTIONS_FUNDING_AMOUNT";
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub config: DeploywireConfig,
    pub config_path: PathBuf,
}

impl Settings {
    /// Load deploywire.toml (built-in defaults if absent) and hydrate the env store.
    pub fn load(env_file: Option<&str>, config_file: Option<&str>) -> Result<(Self, EnvStore)> {
        let config_path = paths::config_file(config_file)?;
        let config = defaults::load_config(&config_path)?;
        let store = EnvStore::load(paths::env_file(env_file)?)?;
        Ok((
            Self {
                config,
                config_path,
            },
            store,
        ))
    }

    pub fn new(config: DeploywireConfig) -> Self {
        Self {
            config,
            config_path: PathBuf::from(paths::DEFAULT_CONFIG_FILE),
        }
    }

    pub fn address_key(&self) -> &str {
        &self.config.deploy.address_key
    }

    pub fn working_dir(&self) -> Option<PathBuf> {
        self.config.deploy.working_dir.as_deref().map(PathBuf::from)
    }

    pub fn cast_program(&self) -> &str {
        &self.config.tools.cast
    }

    pub fn receipt_policy(&self) -> ReceiptPolicy {
        ReceiptPolicy {
            confirmations: self.config.rpc.confirmations.max(1),
            poll_interval: Duration::from_millis(self.config.rpc.poll_interval_ms),
            max_polls: self.config.rpc.max_polls.max(1),
        }
    }

    pub fn explorer_retry(&self) -> (u32, Duration) {
        (
            self.config.explorer.attempts.max(1),
            Duration::from_millis(self.config.explorer.retry_delay_ms),
        )
    }

    pub fn explorer_api_url(&self, store: &EnvStore) -> String {
        store.get_or(keys::EXPLORER_API_URL, &self.config.explorer.api_url)
    }
}

/// Read `key` from the store, falling back to `default`, and parse it.
pub fn parsed_or<T>(store: &EnvStore, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match store.get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| Error::config_invalid_value(key, Some(raw.to_string()), e.to_string())),
        None => Ok(default),
    }
}
