//! `netif-exporter` binary.
//!
//! Watches the host's network interfaces and serves their state as
//! Prometheus metrics plus a JSON snapshot.

use netif_exporter::config::{Cli, Command, ValidatedConfig, write_default_config};
use std::path::Path;
use std::process::ExitCode;

mod app;
mod run;

use app::{exit_code, print_config_hint, setup_tracing};

/// Parses arguments, then either writes a config template (`init`) or
/// starts the exporter and blocks until it is told to stop.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    if let Some(Command::Init { output }) = &cli.command {
        return write_template(output);
    }

    let config = match ValidatedConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            print_config_hint(&e);
            return exit_code::CONFIG_ERROR;
        }
    };

    // Tracing is configured only once verbosity is known.
    setup_tracing(config.verbose);
    tracing::info!("{config}");

    serve(config)
}

/// Writes the commented TOML template to `output`.
fn write_template(output: &Path) -> ExitCode {
    if let Err(e) = write_default_config(output) {
        eprintln!("Error: {e}");
        return exit_code::CONFIG_ERROR;
    }
    println!("Configuration template written to: {}", output.display());
    exit_code::SUCCESS
}

/// Builds the Tokio runtime and drives the exporter to completion.
///
/// Any error past configuration maps to the runtime exit code.
#[cfg(not(tarpaulin_include))]
fn serve(config: ValidatedConfig) -> ExitCode {
    let result = tokio::runtime::Runtime::new()
        .map_err(|e| format!("cannot start Tokio runtime: {e}"))
        .and_then(|runtime| {
            runtime
                .block_on(run::execute(config))
                .map_err(|e| e.to_string())
        });

    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            tracing::error!("Exporter stopped: {e}");
            exit_code::runtime_error()
        }
    }
}
