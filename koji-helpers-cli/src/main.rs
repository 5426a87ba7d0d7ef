//! koji-helpers: quiescence-driven Koji automation.
//!
//! # Usage
//!
//! ```text
//! koji-helpers [--config <path>] [--json-logs] smashd
//! koji-helpers [--config <path>] [--json-logs] gojira
//! koji-helpers [--config <path>] state show [--json]
//! koji-helpers [--config <path>] config check
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigCommand, state::StateCommand};
use koji_helpers_core::config::DEFAULT_CONFIG_PATH;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "koji-helpers",
    version,
    about = "Sign, compose and regenerate Koji repositories once activity settles",
    long_about = None,
)]
struct Cli {
    /// Configuration file.
    #[arg(
        long,
        global = true,
        env = "KOJI_HELPERS_CONFIG",
        default_value = DEFAULT_CONFIG_PATH
    )]
    config: PathBuf,

    /// Emit log lines as JSON objects.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign, compose and announce tag changes once they settle.
    Smashd,

    /// Regenerate buildroot repos once their external repos settle.
    Gojira,

    /// Inspect monitor state files.
    State {
        #[command(subcommand)]
        command: StateCommand,
    },

    /// Inspect the configuration.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Smashd => commands::smashd::run(&cli.config, cli.json_logs),
        Commands::Gojira => commands::gojira::run(&cli.config, cli.json_logs),
        Commands::State { command } => commands::state::run(&cli.config, command),
        Commands::Config { command } => commands::config::run(&cli.config, command),
    }
}
