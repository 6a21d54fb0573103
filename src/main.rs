use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{automation, deploy, env, functions, GlobalArgs};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deploywire")]
#[command(version = VERSION)]
#[command(about = "Deploy a contract and wire it into automation and functions services")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(flatten)]
    run: deploy::RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an Upkeep for the stored contract address
    Automation(automation::AutomationArgs),
    /// Set up a functions subscription for the stored contract address
    Functions(functions::FunctionsArgs),
    /// Read or write the environment file
    Env(env::EnvArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    deploywire::logging::init(cli.global.verbose);

    let (json_result, exit_code) = commands::run_json(cli.command, cli.run, &cli.global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
