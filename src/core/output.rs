//! Public output types for deploywire command responses.

use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Error as carried inside a report entry.
#[derive(Debug, Clone, Serialize)]
pub struct StageError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<&Error> for StageError {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code.as_str().to_string(),
            message: err.message.clone(),
            details: err.details.clone(),
        }
    }
}

/// Outcome of one pipeline stage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub stage: String,
    pub status: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
}

impl StageOutcome {
    pub fn succeeded<T: Serialize>(stage: &str, values: &T) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Succeeded,
            reason: None,
            error: None,
            values: serde_json::to_value(values).ok(),
        }
    }

    pub fn failed(stage: &str, err: &Error) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Failed,
            reason: None,
            error: Some(StageError::from(err)),
            values: None,
        }
    }

    pub fn skipped(stage: &str, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::Skipped,
            reason: Some(reason.into()),
            error: None,
            values: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl PipelineSummary {
    pub fn from_stages(stages: &[StageOutcome]) -> Self {
        let count = |status| stages.iter().filter(|s| s.status == status).count();
        Self {
            total: stages.len(),
            succeeded: count(StageStatus::Succeeded),
            failed: count(StageStatus::Failed),
            skipped: count(StageStatus::Skipped),
        }
    }
}
