//! Command execution primitives with consistent error handling.

use std::path::Path;
use std::process::Command;

use serde::Serialize;

use crate::error::{CommandFailedDetails, Error, Result};

/// Captured output from command execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr. Deploy tools split their reporting across
    /// both streams.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Run a prepared command to completion and capture both streams.
///
/// Returns the captured output on exit status 0, `command.failed` otherwise.
/// `display` is the human-readable command line used in errors.
pub fn run_captured(mut cmd: Command, display: &str) -> Result<CapturedOutput> {
    let output = cmd.output().map_err(|e| {
        Error::internal_io(
            format!("Failed to run {}: {}", display, e),
            Some(display.to_string()),
        )
    })?;

    let captured = CapturedOutput::new(
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    );

    if !output.status.success() {
        return Err(Error::command_failed(CommandFailedDetails {
            command: display.to_string(),
            exit_code: output.status.code(),
            stdout: captured.stdout,
            stderr: captured.stderr,
        }));
    }

    Ok(captured)
}

/// Run a shell command line via `sh -c`, optionally in `dir` with extra env vars.
pub fn run_shell(
    command: &str,
    dir: Option<&Path>,
    env: &[(String, String)],
) -> Result<CapturedOutput> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }
    cmd.envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    run_captured(cmd, command)
}

/// Run a program directly (no shell) and capture its output.
pub fn run(program: &str, args: &[String], display: &str) -> Result<CapturedOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    run_captured(cmd, display)
}
