//! `mutt-ldap`: LDAP address queries for mutt.
//!
//! Prints `<N> addresses found:` followed by one `Name <address>` per line.

use clap::Parser;
use mutt_ldap::{lookup, render, DirectoryClient};
use mutt_ldap_core::{Configuration, Error, Result};
use std::env;
use std::io::Write;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Overrides the configuration file path.
const CONFIG_ENV: &str = "MUTT_LDAP_CONFIG";

/// Log filter used when `RUST_LOG` is unset.
const LOG_ENV: &str = "MUTT_LDAP_LOG";

/// Every argument is query text, so there are no options and no help or version flags.
#[derive(Parser)]
#[command(name = "mutt-ldap")]
#[command(about = "Search an LDAP directory for mail addresses", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    /// Words to search for in names, user ids and mail addresses
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    query: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the mail client.
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(code = err.error_code(), "lookup failed");
            eprintln!("mutt-ldap: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match env::var_os(CONFIG_ENV) {
        Some(path) => Configuration::load_from(path)?,
        None => Configuration::load()?,
    };
    debug!(
        server = %config.connection.server,
        basedn = %config.connection.basedn,
        "configuration loaded"
    );

    let client = DirectoryClient::new(config);
    let addresses = lookup(&client, cli.query.as_slice()).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(render(&addresses).as_bytes())
        .and_then(|()| stdout.flush())
        .map_err(|err| Error::OutputError(err.to_string()))
}
