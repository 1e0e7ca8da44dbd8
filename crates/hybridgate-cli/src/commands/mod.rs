mod config;
mod lookup;
mod serve;

use std::process::ExitCode;
use std::sync::Arc;

use hybridgate_core::{Gateway, GatewayConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = GatewayConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Config => config::run(&config),
        Command::Lookup(args) => {
            let gateway = Gateway::builder(config).build();
            lookup::run(args, &gateway, cli.pretty).await
        }
        Command::Serve(args) => {
            let gateway = Arc::new(Gateway::builder(config).build());
            serve::run(args, gateway).await
        }
    }
}

fn render_json(value: &serde_json::Value, pretty: bool) -> Result<String, CliError> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(rendered)
}
