use clap::Args;

use deploywire::pipeline::{self, Connection, PipelineOptions, PipelineReport};
use deploywire::runner::ShellRunner;

use super::{finish, CmdResult, GlobalArgs};

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Register an automation Upkeep for the deployed contract
    #[arg(long)]
    pub automation: bool,

    /// Create or reuse a functions subscription and add the contract as consumer
    #[arg(long)]
    pub functions: bool,
}

pub fn run(args: RunArgs, global: &GlobalArgs) -> CmdResult<PipelineReport> {
    let (settings, mut store) = global.load()?;
    let options = PipelineOptions {
        automation: args.automation,
        functions: args.functions,
    };

    let report = pipeline::run(&settings, &mut store, &ShellRunner, options, Connection::open);
    finish(report)
}
