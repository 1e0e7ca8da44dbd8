use std::io::Read;
use std::process::ExitCode;

use hybridgate_core::{Gateway, ReplyStatus};
use serde_json::Value;

use crate::cli::LookupArgs;
use crate::error::CliError;

use super::render_json;

pub async fn run(args: &LookupArgs, gateway: &Gateway, pretty: bool) -> Result<ExitCode, CliError> {
    let raw = match &args.input {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let payload = parse_payload(&raw)?;

    let reply = gateway.handle_str(&args.category, &payload).await;
    println!("{}", render_json(&reply.to_json()?, pretty)?);

    Ok(exit_code(reply.status()))
}

fn parse_payload(raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(CliError::Input)
}

fn exit_code(status: ReplyStatus) -> ExitCode {
    match status {
        ReplyStatus::Ok => ExitCode::SUCCESS,
        ReplyStatus::BadRequest => ExitCode::from(2),
        ReplyStatus::InternalServerError => ExitCode::from(3),
    }
}
