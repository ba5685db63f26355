//! Upfile CLI Binary
//!
//! Command-line access to configured upload contexts.

use anyhow::{anyhow, Context as _};
use clap::Parser;
use std::process;
use tracing::{error, info};
use upfile::cli::{map_error, Cli, RunContext};
use upfile::config::ConfigLoader;
use upfile::logging::{init_logging, LoggingConfig};

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("{:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<String> {
    let logging_config = build_logging_config(cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;

    info!("Upfile CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone())
        .map_err(|e| anyhow!(map_error(&e)))
        .with_context(|| format!("Failed to load workspace {}", cli.workspace.display()))?;

    context
        .execute(&cli.command)
        .map_err(|e| anyhow!(map_error(&e)))
}

/// Build logging configuration from CLI args and the config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }
    if let Some(ref file) = cli.log_file {
        config.file = file.clone();
    } else if config.file.is_relative() {
        config.file = cli.workspace.join(&config.file);
    }

    config
}
