// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use console_core::domain::console_config::{ConsoleConfigManifest, CONFIG_PATH_ENV};

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
        /// Output path (default: ./dfir-console.yaml)
        #[arg(short, long, default_value = "./dfir-console.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = ConsoleConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        for (index, path) in ConsoleConfigManifest::search_paths().iter().enumerate() {
            let marker = if path.exists() { "✓".green() } else { " ".normal() };
            println!("  {}. {} {}", index + 2, path.display(), marker);
        }
        println!(
            "  ({}: {})",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let server = &config.spec.server;
    println!("{}", "Server:".bold());
    println!("  URL: {}", server.url);
    println!(
        "  Base path: {}",
        if server.base_path.is_empty() { "/" } else { server.base_path.as_str() }
    );
    println!(
        "  API key: {}",
        match &server.api_key {
            Some(key) if key.starts_with("env:") => key.clone(),
            Some(_) => "(set)".to_string(),
            None => "(none)".to_string(),
        }
    );
    println!("  Timeout: {}s", server.timeout_seconds);
    if server.accept_invalid_certs {
        println!("  {}", "TLS verification disabled".yellow());
    }
    println!();

    println!("{}", "Polling:".bold());
    println!("  Interval: {}ms", config.spec.polling.interval_ms);
    println!();

    println!("Debug: {}", config.spec.debug);

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ConsoleConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;
    config
        .api_config()
        .context("Failed to resolve API client configuration")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
