//! Subprocess execution seam.
//!
//! The pipeline only talks to external tools through [`CommandRunner`], so
//! tests can substitute scripted output.

use std::path::Path;

use crate::error::Result;
use crate::utils::command::{self, CapturedOutput};
use crate::utils::shell;

pub trait CommandRunner {
    /// Run a shell command line to completion.
    fn shell(&self, command: &str, dir: Option<&Path>, env: &[(String, String)])
        -> Result<CapturedOutput>;

    /// Run a program directly with an argument vector.
    fn exec(&self, program: &str, args: &[String]) -> Result<CapturedOutput>;
}

/// Runs commands on the local machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn shell(
        &self,
        command: &str,
        dir: Option<&Path>,
        env: &[(String, String)],
    ) -> Result<CapturedOutput> {
        tracing::debug!(target: "runner", command, "sh -c");
        command::run_shell(command, dir, env)
    }

    fn exec(&self, program: &str, args: &[String]) -> Result<CapturedOutput> {
        let shown = shell::display_invocation(program, args);
        tracing::debug!(target: "runner", command = %shown, "exec");
        command::run(program, args, &shown)
    }
}
