// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hunt commands
//!
//! Commands: list, create

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::Subcommand;
use colored::Colorize;

use console_core::domain::api::{ArtifactCollectorArgs, Hunt, HuntRequest, HuntState};

use super::format_micros;
use crate::session::{ConnectOptions, Session};

#[derive(Subcommand)]
pub enum HuntCommand {
    /// List hunts, newest first
    List {
        /// Number of hunts to fetch
        #[arg(long, default_value = "50")]
        count: u64,

        /// Skip this many hunts
        #[arg(long, default_value = "0")]
        offset: u64,
    },

    /// Create a hunt collecting artifacts across all clients
    Create {
        #[arg(value_name = "ARTIFACT", required = true)]
        artifacts: Vec<String>,

        /// Hunt description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Expire the hunt after this many hours
        #[arg(long, value_name = "HOURS")]
        expires_in: Option<i64>,
    },
}

pub async fn handle_command(command: HuntCommand, options: ConnectOptions) -> Result<()> {
    let session = Session::connect(options)?;

    match command {
        HuntCommand::List { count, offset } => {
            let hunts = session
                .client
                .list_hunts(count, offset, &session.cancel)
                .await
                .context("Failed to list hunts")?;

            if hunts.items.is_empty() {
                println!("{}", "No hunts found".yellow());
                return Ok(());
            }

            println!("{} hunts:", hunts.items.len());
            for hunt in &hunts.items {
                print_hunt(hunt);
            }
            Ok(())
        }
        HuntCommand::Create {
            artifacts,
            description,
            expires_in,
        } => {
            let request = HuntRequest {
                hunt_description: description,
                expires: expires_in.map(expiry_micros).unwrap_or_default(),
                start_request: ArtifactCollectorArgs::for_client(String::new(), artifacts),
            };

            let hunt_id = session
                .client
                .create_hunt(&request, &session.cancel)
                .await
                .context("Failed to create hunt")?;

            println!("{}", format!("✓ Hunt created: {}", hunt_id).green());
            Ok(())
        }
    }
}

/// Expiry `hours` from now, in microseconds since the epoch.
fn expiry_micros(hours: i64) -> u64 {
    let expires = Utc::now() + Duration::hours(hours.clamp(1, 24 * 3650));
    u64::try_from(expires.timestamp_micros()).unwrap_or_default()
}

fn print_hunt(hunt: &Hunt) {
    let description = if hunt.hunt_description.is_empty() {
        hunt.start_request.artifacts.join(", ")
    } else {
        hunt.hunt_description.clone()
    };
    println!(
        "  {} - {} - {} - {}/{} clients - created {}",
        hunt.hunt_id,
        format_state(hunt.state),
        description,
        hunt.stats.total_clients_with_results,
        hunt.stats.total_clients_scheduled,
        format_micros(hunt.create_time)
    );
}

fn format_state(state: HuntState) -> colored::ColoredString {
    match state {
        HuntState::Running => "RUNNING".green(),
        HuntState::Paused => "PAUSED".yellow(),
        HuntState::Stopped => "STOPPED".red(),
        HuntState::Archived => "ARCHIVED".dimmed(),
        HuntState::Unset => "UNSET".normal(),
        HuntState::Unknown => "UNKNOWN".dimmed(),
    }
}
