use clap::Args;

use deploywire::pipeline::{PipelineOptions, PipelineReport};

use super::{run_stored, CmdResult, GlobalArgs};

#[derive(Args, Debug, Default)]
pub struct AutomationArgs {}

pub fn run(_args: AutomationArgs, global: &GlobalArgs) -> CmdResult<PipelineReport> {
    run_stored(
        PipelineOptions {
            automation: true,
            functions: false,
        },
        global,
    )
}
