// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # Nudge CLI
//!
//! The `nudge` binary drives the adaptive reminder engine in-process.
//!
//! ## Commands
//!
//! - `nudge config show|validate|generate` - Configuration management
//! - `nudge simulate --plan FILE` - Replay a scripted plan against a virtual clock
//! - `nudge run --seed FILE` - Schedule and dispatch continuously until Ctrl-C

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod plan;
mod wiring;

use commands::{ConfigCommand, RunArgs, SimulateArgs};

/// Nudge - adaptive reminder scheduling engine
#[derive(Parser)]
#[command(name = "nudge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(short, long, global = true, env = "NUDGE_CONFIG_PATH", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "NUDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Replay a scripted plan with a virtual clock
    #[command(name = "simulate")]
    Simulate(SimulateArgs),

    /// Run the scheduler and dispatcher until interrupted
    #[command(name = "run")]
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
        Commands::Simulate(args) => commands::simulate::execute(args, cli.config).await,
        Commands::Run(args) => commands::run::execute(args, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
