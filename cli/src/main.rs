// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # DFIR Console CLI
//!
//! The `dfir` binary is a terminal front end for a GRR/Velociraptor-style
//! DFIR server. It talks to the server's REST API only.
//!
//! ## Commands
//!
//! - `dfir path split|join|url-encode|url-decode` - Offline VFS path codec
//! - `dfir vfs ls|refresh|download|tree` - Browse a client's virtual filesystem
//! - `dfir client show` - Client host information
//! - `dfir flow show|watch|cancel|collect|results` - Flow operations
//! - `dfir hunt list|create` - Hunt operations
//! - `dfir config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use console_core::domain::console_config::{ConfigError, ConsoleConfigManifest};
use dfir_console::commands::{
    self, ClientCommand, ConfigCommand, FlowCommand, HuntCommand, PathCommand, VfsCommand,
};
use dfir_console::session::ConnectOptions;

/// DFIR Console - Investigate endpoints from the terminal
#[derive(Parser)]
#[command(name = "dfir")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "DFIR_CONSOLE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Server URL (overrides configuration)
    #[arg(long, global = true, value_name = "URL")]
    server: Option<String>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, global = true, env = "DFIR_CONSOLE_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode and decode VFS paths (offline)
    #[command(name = "path")]
    Path {
        #[command(subcommand)]
        command: PathCommand,
    },

    /// Browse a client's virtual filesystem
    #[command(name = "vfs")]
    Vfs {
        #[command(subcommand)]
        command: VfsCommand,
    },

    /// Client information
    #[command(name = "client")]
    Client {
        #[command(subcommand)]
        command: ClientCommand,
    },

    /// Flow operations
    #[command(name = "flow")]
    Flow {
        #[command(subcommand)]
        command: FlowCommand,
    },

    /// Hunt operations
    #[command(name = "hunt")]
    Hunt {
        #[command(subcommand)]
        command: HuntCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let loaded = ConsoleConfigManifest::load_or_default(cli.config.clone());
    init_logging(&log_settings(cli.log_level.as_deref(), loaded.as_ref().ok()))?;
    match &loaded {
        Ok(_) => match ConsoleConfigManifest::source_path(cli.config.as_deref()) {
            Some(path) => info!("Loaded configuration from {:?}", path),
            None => debug!("No configuration file found. Using defaults."),
        },
        Err(e) => warn!("Failed to load configuration: {}", e),
    }

    match cli.command {
        Some(Commands::Path { command }) => commands::path::handle_command(command),
        Some(Commands::Vfs { command }) => {
            commands::vfs::handle_command(command, connect_options(loaded, cli.server)?).await
        }
        Some(Commands::Client { command }) => {
            commands::client::handle_command(command, connect_options(loaded, cli.server)?).await
        }
        Some(Commands::Flow { command }) => {
            commands::flow::handle_command(command, connect_options(loaded, cli.server)?).await
        }
        Some(Commands::Hunt { command }) => {
            commands::hunt::handle_command(command, connect_options(loaded, cli.server)?).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

fn connect_options(
    loaded: Result<ConsoleConfigManifest, ConfigError>,
    server: Option<String>,
) -> Result<ConnectOptions> {
    Ok(ConnectOptions {
        config: loaded.context("Failed to load configuration")?,
        server,
    })
}

/// Logging settings after applying the configuration file.
#[derive(Debug, PartialEq)]
struct LogSettings {
    level: String,
    json: bool,
}

/// An explicit `--log-level` wins; otherwise `debug: true`, then the
/// configured logging level, then `info`.
fn log_settings(requested: Option<&str>, config: Option<&ConsoleConfigManifest>) -> LogSettings {
    let logging = config
        .and_then(|config| config.spec.observability.as_ref())
        .and_then(|observability| observability.logging.as_ref());

    let level = match requested {
        Some(level) => level.to_string(),
        None if config.is_some_and(|config| config.spec.debug) => "debug".to_string(),
        None => logging
            .map(|logging| logging.level.clone())
            .unwrap_or_else(|| "info".to_string()),
    };

    LogSettings {
        level,
        json: logging.is_some_and(|logging| logging.format == "json"),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(settings: &LogSettings) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&settings.level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);

    if settings.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(spec: &str) -> ConsoleConfigManifest {
        ConsoleConfigManifest::from_yaml_str(&format!(
            "apiVersion: dfir-console/v1\nkind: ConsoleConfig\nmetadata:\n  name: lab\nspec:\n{}",
            spec
        ))
        .unwrap()
    }

    #[test]
    fn test_explicit_info_overrides_debug_config() {
        let config = manifest("  debug: true\n");
        assert_eq!(log_settings(Some("info"), Some(&config)).level, "info");
        assert_eq!(log_settings(None, Some(&config)).level, "debug");
    }

    #[test]
    fn test_configured_logging_applies_without_flag() {
        let config = manifest("  observability:\n    logging:\n      level: warn\n      format: json\n");
        assert_eq!(
            log_settings(None, Some(&config)),
            LogSettings {
                level: "warn".to_string(),
                json: true,
            }
        );
        assert_eq!(log_settings(Some("trace"), Some(&config)).level, "trace");
    }

    #[test]
    fn test_defaults_to_info_without_config() {
        assert_eq!(
            log_settings(None, None),
            LogSettings {
                level: "info".to_string(),
                json: false,
            }
        );
    }
}
