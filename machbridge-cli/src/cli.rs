//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// `MachBridge` command-line interface for remote machine control
#[derive(Parser)]
#[command(name = "machbridge-cli")]
#[command(author, version, about = "MachBridge command-line interface")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the machines configuration file
    #[arg(
        short,
        long,
        global = true,
        env = "MACHBRIDGE_CONFIG",
        default_value = "machbridge.json"
    )]
    pub config: PathBuf,

    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List configured machines and their facets
    #[command(about = "List configured machines and their facets")]
    List,

    /// Send a wake-on-LAN packet to a machine's host
    #[command(about = "Wake a machine's host over the network")]
    Wake {
        /// Machine identifier from the configuration
        machine: String,
    },

    /// Switch a machine's host off using its configured mechanism
    #[command(about = "Switch a machine's host off")]
    Suspend {
        /// Machine identifier from the configuration
        machine: String,
    },

    /// Monitor machines and print availability and resource changes
    #[command(about = "Watch machines until interrupted")]
    Watch {
        /// Only watch this machine instead of all configured ones
        machine: Option<String>,
    },
}
