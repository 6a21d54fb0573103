use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidToml,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    CommandFailed,

    DeployAddressNotFound,
    DeployInvalidAddress,

    RpcRequestFailed,
    RpcTransactionReverted,
    RpcReceiptTimeout,

    ExplorerRequestFailed,
    ExplorerResultMissing,

    RegistrationLogMissing,

    PipelineStageFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidToml => "config.invalid_toml",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::CommandFailed => "command.failed",

            ErrorCode::DeployAddressNotFound => "deploy.address_not_found",
            ErrorCode::DeployInvalidAddress => "deploy.invalid_address",

            ErrorCode::RpcRequestFailed => "rpc.request_failed",
            ErrorCode::RpcTransactionReverted => "rpc.transaction_reverted",
            ErrorCode::RpcReceiptTimeout => "rpc.receipt_timeout",

            ErrorCode::ExplorerRequestFailed => "explorer.request_failed",
            ErrorCode::ExplorerResultMissing => "explorer.result_missing",

            ErrorCode::RegistrationLogMissing => "registration.log_missing",

            ErrorCode::PipelineStageFailed => "pipeline.stage_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandFailedDetails {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(ErrorCode::ValidationInvalidArgument, problem, details)
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        let key = key.into();
        let details = to_details(ConfigMissingKeyDetails {
            key: key.clone(),
            path,
        });

        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration key {}", key),
            details,
        )
        .with_hint(format!(
            "Run 'deploywire env set {} <value>' or add it to your .env file",
            key
        ))
    }

    pub fn config_invalid_toml(path: impl Into<String>, err: toml::de::Error) -> Self {
        let path = path.into();
        let details = serde_json::json!({
            "path": path,
            "error": err.to_string(),
        });

        Self::new(
            ErrorCode::ConfigInvalidToml,
            format!("Invalid TOML in {}", path),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = to_details(ConfigInvalidValueDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        });

        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid value for {}: {}", key, problem),
            details,
        )
    }

    pub fn command_failed(details: CommandFailedDetails) -> Self {
        let message = match details.exit_code {
            Some(code) => format!("Command exited with status {}: {}", code, details.command),
            None => format!("Command terminated by signal: {}", details.command),
        };

        Self::new(ErrorCode::CommandFailed, message, to_details(details))
    }

    pub fn deploy_address_not_found(rules: Vec<String>) -> Self {
        Self::new(
            ErrorCode::DeployAddressNotFound,
            "No contract address found in deploy output",
            serde_json::json!({ "rules": rules }),
        )
        .with_hint("Add a pattern under [deploy] patterns in deploywire.toml matching your tool's output")
    }

    pub fn deploy_invalid_address(address: impl Into<String>, rule: impl Into<String>) -> Self {
        let address = address.into();
        Self::new(
            ErrorCode::DeployInvalidAddress,
            format!("Extracted value '{}' is not a 20-byte hex address", address),
            serde_json::json!({ "address": address, "rule": rule.into() }),
        )
    }

    pub fn rpc_request_failed(method: impl Into<String>, error: impl Into<String>) -> Self {
        let method = method.into();
        let error = error.into();
        Self::new(
            ErrorCode::RpcRequestFailed,
            format!("JSON-RPC {} failed: {}", method, error),
            serde_json::json!({ "method": method, "error": error }),
        )
    }

    pub fn rpc_transaction_reverted(tx_hash: impl Into<String>, block: u64) -> Self {
        let tx_hash = tx_hash.into();
        Self::new(
            ErrorCode::RpcTransactionReverted,
            format!("Transaction {} reverted in block {}", tx_hash, block),
            serde_json::json!({ "txHash": tx_hash, "block": block }),
        )
    }

    pub fn rpc_receipt_timeout(tx_hash: impl Into<String>, polls: u32) -> Self {
        let tx_hash = tx_hash.into();
        Self::new(
            ErrorCode::RpcReceiptTimeout,
            format!("No confirmed receipt for {} after {} polls", tx_hash, polls),
            serde_json::json!({ "txHash": tx_hash, "polls": polls }),
        )
    }

    pub fn explorer_request_failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::ExplorerRequestFailed,
            format!("Explorer request failed: {}", error),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn explorer_result_missing(tx_hash: impl Into<String>, message: impl Into<String>) -> Self {
        let tx_hash = tx_hash.into();
        Self::new(
            ErrorCode::ExplorerResultMissing,
            format!("Explorer returned no created contract for {}", tx_hash),
            serde_json::json!({ "txHash": tx_hash, "message": message.into() }),
        )
    }

    pub fn registration_log_missing(event: impl Into<String>, tx_hash: impl Into<String>) -> Self {
        let event = event.into();
        let tx_hash = tx_hash.into();
        Self::new(
            ErrorCode::RegistrationLogMissing,
            format!("Receipt for {} has no {} log", tx_hash, event),
            serde_json::json!({ "event": event, "txHash": tx_hash }),
        )
    }

    /// `report` is the serialized pipeline report.
    pub fn pipeline_stage_failed(stages: &[&str], report: Value) -> Self {
        Self::new(
            ErrorCode::PipelineStageFailed,
            format!("Stage(s) failed: {}", stages.join(", ")),
            report,
        )
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        let details = to_details(InternalIoErrorDetails {
            error: error.into(),
            context,
        });

        Self::new(ErrorCode::InternalIoError, "IO error", details)
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": error.into(),
            "context": context,
        });

        Self::new(ErrorCode::InternalJsonError, "JSON error", details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        let error = error.into();
        Self::new(
            ErrorCode::InternalUnexpected,
            error.clone(),
            serde_json::json!({ "error": error }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}
