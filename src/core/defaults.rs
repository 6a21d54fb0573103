use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::io;

/// Root structure of deploywire.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploywireConfig {
    #[serde(default)]
    pub deploy: DeployDefaults,

    #[serde(default)]
    pub rpc: RpcDefaults,

    #[serde(default)]
    pub explorer: ExplorerDefaults,

    #[serde(default)]
    pub automation: AutomationDefaults,

    #[serde(default)]
    pub functions: FunctionsDefaults,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// How the contract is deployed and where its address goes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployDefaults {
    #[serde(default = "default_deploy_command")]
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default = "default_address_key")]
    pub address_key: String,

    /// Extra extraction patterns, tried before the built-in rules.
    /// Each must contain one capture group.
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcDefaults {
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerDefaults {
    #[serde(default = "default_explorer_api_url")]
    pub api_url: String,

    #[serde(default = "default_explorer_attempts")]
    pub attempts: u32,

    #[serde(default = "default_explorer_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationDefaults {
    #[serde(default = "default_upkeep_name")]
    pub upkeep_name: String,

    #[serde(default = "default_gas_limit")]
    pub gas_limit: u32,

    #[serde(default)]
    pub trigger_type: u8,

    /// LINK in juels.
    #[serde(default = "default_upkeep_funding")]
    pub funding_amount: String,

    /// Setter called on the deployed contract with the forwarder address.
    /// Empty disables the call.
    #[serde(default = "default_forwarder_setter")]
    pub forwarder_setter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsDefaults {
    /// LINK in juels; "0" skips funding.
    #[serde(default = "default_subscription_funding")]
    pub funding_amount: String,

    /// Setter called on the deployed contract with the subscription id.
    #[serde(default)]
    pub consumer_setter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_cast")]
    pub cast: String,
}

impl Default for DeployDefaults {
    fn default() -> Self {
        Self {
            command: default_deploy_command(),
            working_dir: None,
            address_key: default_address_key(),
            patterns: Vec::new(),
        }
    }
}

impl Default for RpcDefaults {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl Default for ExplorerDefaults {
    fn default() -> Self {
        Self {
            api_url: default_explorer_api_url(),
            attempts: default_explorer_attempts(),
            retry_delay_ms: default_explorer_retry_delay_ms(),
        }
    }
}

impl Default for AutomationDefaults {
    fn default() -> Self {
        Self {
            upkeep_name: default_upkeep_name(),
            gas_limit: default_gas_limit(),
            trigger_type: 0,
            funding_amount: default_upkeep_funding(),
            forwarder_setter: default_forwarder_setter(),
        }
    }
}

impl Default for FunctionsDefaults {
    fn default() -> Self {
        Self {
            funding_amount: default_subscription_funding(),
            consumer_setter: String::new(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cast: default_cast(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_deploy_command() -> String {
    "forge script script/Deploy.s.sol --rpc-url \"$RPC_URL\" --private-key \"$PRIVATE_KEY\" --broadcast"
        .to_string()
}

fn default_address_key() -> String {
    "CONTRACT_ADDRESS".to_string()
}

fn default_confirmations() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

fn default_max_polls() -> u32 {
    150
}

fn default_explorer_api_url() -> String {
    "https://api.etherscan.io/v2/api".to_string()
}

fn default_explorer_attempts() -> u32 {
    5
}

fn default_explorer_retry_delay_ms() -> u64 {
    3_000
}

fn default_upkeep_name() -> String {
    "deploywire upkeep".to_string()
}

fn default_gas_limit() -> u32 {
    500_000
}

fn default_upkeep_funding() -> String {
    // 5 LINK
    "5000000000000000000".to_string()
}

fn default_forwarder_setter() -> String {
    "setForwarder(address)".to_string()
}

fn default_subscription_funding() -> String {
    // 2 LINK
    "2000000000000000000".to_string()
}

fn default_cast() -> String {
    "cast".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load deploywire.toml, falling back to built-in defaults when the file is absent.
///
/// A file that exists but does not parse is an error.
pub fn load_config(path: &Path) -> Result<DeploywireConfig> {
    match io::read_file_optional(path, &format!("read {}", path.display()))? {
        Some(content) => parse_config(&content, &path.display().to_string()),
        None => Ok(DeploywireConfig::default()),
    }
}

/// Parse deploywire.toml content.
pub fn parse_config(content: &str, origin: &str) -> Result<DeploywireConfig> {
    toml::from_str(content).map_err(|e| Error::config_invalid_toml(origin, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_builtin_defaults() {
        let config = parse_config("", "test").unwrap();
        assert_eq!(config.deploy.address_key, "CONTRACT_ADDRESS");
        assert_eq!(config.rpc.confirmations, 1);
        assert_eq!(config.automation.gas_limit, 500_000);
        assert_eq!(config.tools.cast, "cast");
        assert!(config.functions.consumer_setter.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let content = r#"
[deploy]
command = "forge create src/Consumer.sol:Consumer"
patterns = ['Consumer at (0x[0-9a-fA-F]+)']

[explorer]
attempts = 2
"#;
        let config = parse_config(content, "test").unwrap();
        assert_eq!(config.deploy.command, "forge create src/Consumer.sol:Consumer");
        assert_eq!(config.deploy.patterns.len(), 1);
        assert_eq!(config.deploy.address_key, "CONTRACT_ADDRESS");
        assert_eq!(config.explorer.attempts, 2);
        assert_eq!(config.explorer.api_url, "https://api.etherscan.io/v2/api");
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = parse_config("[deploy\ncommand = 1", "deploywire.toml").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_toml");
        assert_eq!(err.details["path"], "deploywire.toml");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("deploywire.toml")).unwrap();
        assert_eq!(config.rpc.max_polls, DeploywireConfig::default().rpc.max_polls);
    }

    #[test]
    fn load_config_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploywire.toml");
        std::fs::write(&path, "[rpc]\nconfirmations = 3\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.rpc.confirmations, 3);
    }
}
