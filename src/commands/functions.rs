use clap::Args;

use deploywire::pipeline::{PipelineOptions, PipelineReport};

use super::{run_stored, CmdResult, GlobalArgs};

#[derive(Args, Debug, Default)]
pub struct FunctionsArgs {}

pub fn run(_args: FunctionsArgs, global: &GlobalArgs) -> CmdResult<PipelineReport> {
    run_stored(
        PipelineOptions {
            automation: false,
            functions: true,
        },
        global,
    )
}
