use clap::{Args, Subcommand};
use serde::Serialize;

use deploywire::env_store::EnvStore;
use deploywire::error::Error;
use deploywire::paths;
use deploywire::utils::shell;

use super::{CmdResult, GlobalArgs};

#[derive(Args, Debug)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommand,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Read a value (process environment first, then the env file)
    Get {
        key: String,
        /// Returned when the key is unset
        #[arg(long)]
        default: Option<String>,
    },
    /// Write a value to the env file
    Set { key: String, value: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvOutput {
    pub command: String,
    pub key: String,
    pub value: String,
    pub path: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub defaulted: bool,
}

pub fn run(args: EnvArgs, global: &GlobalArgs) -> CmdResult<EnvOutput> {
    let path = paths::env_file(global.env_file.as_deref())?;

    match args.command {
        EnvCommand::Get { key, default } => {
            let store = EnvStore::load(path.clone())?;
            let (value, defaulted) = match (store.get(&key), default) {
                (Some(value), _) => (value.to_string(), false),
                (None, Some(default)) => (default, true),
                (None, None) => {
                    return Err(Error::config_missing_key(key, Some(path.display().to_string())))
                }
            };
            Ok((
                EnvOutput {
                    command: "env.get".to_string(),
                    key,
                    value,
                    path: path.display().to_string(),
                    defaulted,
                },
                0,
            ))
        }
        EnvCommand::Set { key, value } => {
            let mut store = EnvStore::load_isolated(path.clone())?;
            store.set(&key, &value)?;
            let value = if shell::is_secret_key(&key) {
                shell::REDACTED.to_string()
            } else {
                value
            };
            Ok((
                EnvOutput {
                    command: "env.set".to_string(),
                    key,
                    value,
                    path: path.display().to_string(),
                    defaulted: false,
                },
                0,
            ))
        }
    }
}
