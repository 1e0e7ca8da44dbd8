//! CLI argument definitions for hybridgate.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lookup` | Run one lookup from a JSON file or stdin |
//! | `serve` | Serve lookups over HTTP |
//! | `config` | Print the effective configuration |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `$HYBRIDGATE_CONFIG` | TOML configuration file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # One enriched lookup
//! echo '{"target_key":"90210","data_source":{"enrichment":{"enabled":true,"fields":["tax_data"]}}}' \
//!   | hybridgate lookup property_search --pretty
//!
//! # HTTP server on port 8080
//! hybridgate serve --bind 0.0.0.0:8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Hybrid baseline/premium lookup gateway.
#[derive(Debug, Parser)]
#[command(
    name = "hybridgate",
    author,
    version,
    about = "Resilient hybrid data gateway",
    long_about = "hybridgate answers lookups from a free baseline provider and enriches them \
with premium sub-documents while the monthly quota and the provider's health allow it.\n\
\n\
Use 'hybridgate <command> --help' for command-specific help."
)]
pub struct Cli {
    /// TOML configuration file layered over the defaults.
    #[arg(long, global = true, env = "HYBRIDGATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single lookup and print the response envelope.
    ///
    /// Exits 0 on a 200 reply, 2 on a 400 and 3 on a 500.
    ///
    /// # Examples
    ///
    ///   hybridgate lookup property_search --input request.json
    ///   cat request.json | hybridgate lookup market_analysis
    Lookup(LookupArgs),

    /// Serve lookups over HTTP.
    ///
    /// Routes: GET /health, GET /usage, GET /metrics, POST /v1/lookup/{category}
    Serve(ServeArgs),

    /// Print the effective configuration as TOML. The API key is never shown.
    Config,
}

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Request category, e.g. property_search.
    pub category: String,

    /// JSON request file; reads stdin when omitted.
    #[arg(long, short)]
    pub input: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "HYBRIDGATE_BIND", default_value = "127.0.0.1:8080")]
    pub bind: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lookup_with_input_file() {
        let cli = Cli::try_parse_from([
            "hybridgate",
            "--pretty",
            "lookup",
            "property_search",
            "--input",
            "req.json",
        ])
        .expect("valid args");

        assert!(cli.pretty);
        match cli.command {
            Command::Lookup(args) => {
                assert_eq!(args.category, "property_search");
                assert_eq!(args.input, Some(PathBuf::from("req.json")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn serve_rejects_malformed_bind_address() {
        assert!(Cli::try_parse_from(["hybridgate", "serve", "--bind", "nowhere"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
