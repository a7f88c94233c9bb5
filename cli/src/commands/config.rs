// Copyright (c) 2026 Nudge Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use nudge_core::domain::config::EngineConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./nudge-config.yaml")]
        output: PathBuf,

        /// Write the commented template instead of the bare defaults
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

fn humanize(duration: std::time::Duration) -> String {
    humantime::format_duration(duration).to_string()
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let manifest = EngineConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. NUDGE_CONFIG_PATH: {}",
            std::env::var("NUDGE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./nudge-config.yaml");
        println!("  4. ~/.nudge/config.yaml");
        println!("  5. /etc/nudge/config.yaml");
        println!();
    }

    let spec = &manifest.spec;
    println!("{} {}", "Configuration:".bold(), manifest.metadata.name);
    println!();

    println!("{}", "Scheduling:".bold());
    println!("  Conflict buffer: {}", humanize(spec.scheduling.conflict_buffer));
    println!(
        "  Fallback offset: {} - {}",
        humanize(spec.scheduling.fallback_min_offset),
        humanize(spec.scheduling.fallback_max_offset)
    );
    println!("  Prediction timeout: {}", humanize(spec.scheduling.prediction_timeout));
    println!("  Default channel: {}", spec.scheduling.default_channel);
    println!();

    println!("{}", "Behavior:".bold());
    println!("  Recent signal limit: {}", spec.behavior.recent_limit);
    println!();

    println!("{}", "Dispatch:".bold());
    println!("  Interval: {}", humanize(spec.dispatch.interval));
    println!("  Send timeout: {}", humanize(spec.dispatch.send_timeout));
    match spec.lifecycle.sent_ttl {
        Some(ttl) => println!("  Expire unanswered after: {}", humanize(ttl)),
        None => println!("  Expire unanswered after: {}", "(never)".dimmed()),
    }
    println!();

    println!("{}", "Retraining:".bold());
    println!("  Deadline: {}", humanize(spec.retraining.deadline));
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let manifest = EngineConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    manifest.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    if with_examples {
        std::fs::write(&output, include_str!("../../templates/config-with-examples.yaml"))
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    } else {
        EngineConfigManifest::default()
            .to_yaml_file(&output)
            .with_context(|| format!("Failed to write config to {:?}", output))?;
    }

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());
    Ok(())
}
