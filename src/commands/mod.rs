use clap::Args;

use deploywire::config::Settings;
use deploywire::env_store::EnvStore;
use deploywire::pipeline::{self, Connection, PipelineOptions, PipelineReport};
use deploywire::runner::ShellRunner;

pub type CmdResult<T> = deploywire::Result<(T, i32)>;

/// Options shared by every subcommand.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct GlobalArgs {
    /// Environment file to read and update
    #[arg(long, global = true, value_name = "PATH")]
    pub env_file: Option<String>,

    /// Tool configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    pub fn load(&self) -> deploywire::Result<(Settings, EnvStore)> {
        Settings::load(self.env_file.as_deref(), self.config.as_deref())
    }
}

/// A report with failed stages becomes an error envelope carrying the report.
pub(crate) fn finish(report: PipelineReport) -> CmdResult<PipelineReport> {
    match pipeline::report_error(&report) {
        Some(err) => Err(err),
        None => Ok((report, 0)),
    }
}

/// Run registrars against the stored contract address.
pub(crate) fn run_stored(options: PipelineOptions, global: &GlobalArgs) -> CmdResult<PipelineReport> {
    let (settings, mut store) = global.load()?;
    let report = pipeline::run_registrars(&settings, &mut store, &ShellRunner, options, Connection::open)?;
    finish(report)
}

pub mod automation;
pub mod deploy;
pub mod env;
pub mod functions;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: Option<crate::Commands>,
    run_args: deploy::RunArgs,
    global: &GlobalArgs,
) -> (deploywire::Result<serde_json::Value>, i32) {
    match command {
        None => dispatch!(run_args, global, deploy),
        Some(crate::Commands::Automation(args)) => dispatch!(args, global, automation),
        Some(crate::Commands::Functions(args)) => dispatch!(args, global, functions),
        Some(crate::Commands::Env(args)) => dispatch!(args, global, env),
    }
}
