//! `MachBridge` CLI - Command-line interface for the `MachBridge` switch
//! bridge
//!
//! Provides commands for listing configured machines, waking and
//! suspending their hosts, and watching availability and resource
//! changes live.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::dispatch(&cli.config, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

/// Maps `-v` counts onto an env-filter, unless `RUST_LOG` already set one
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "machbridge_core={level},machbridge_cli={level}"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
