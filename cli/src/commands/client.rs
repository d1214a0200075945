// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Client commands
//!
//! Commands: show

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use colored::Colorize;

use console_core::domain::api::ApiClientInfo;

use super::{format_micros, format_time};
use crate::session::{ConnectOptions, Session};

#[derive(Subcommand)]
pub enum ClientCommand {
    /// Show host information for a client
    Show {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        /// Print the raw response as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: ClientCommand, options: ConnectOptions) -> Result<()> {
    let session = Session::connect(options)?;

    match command {
        ClientCommand::Show { client_id, json } => {
            let info = session
                .client
                .get_client(&client_id, &session.cancel)
                .await
                .with_context(|| format!("Failed to fetch client {}", client_id))?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&info).context("Failed to serialize client")?
                );
            } else {
                print_client(&info);
            }
            Ok(())
        }
    }
}

fn print_client(info: &ApiClientInfo) {
    let os = &info.os_info;
    println!("Client {}", info.client_id.bold());
    println!("  Hostname: {}", os.hostname);
    if !os.fqdn.is_empty() {
        println!("  FQDN: {}", os.fqdn);
    }
    println!("  OS: {} {} ({})", os.system, os.release, os.machine);
    println!(
        "  Agent: {} {}",
        info.agent_information.name, info.agent_information.version
    );
    println!("  First seen: {}", format_micros(info.first_seen_at));
    println!("  Last seen: {}", last_seen(info));
    if !info.last_ip.is_empty() {
        println!("  Last IP: {}", info.last_ip);
    }
    if !info.labels.is_empty() {
        println!("  Labels: {}", info.labels.join(", "));
    }
}

fn last_seen(info: &ApiClientInfo) -> String {
    let Some(seen) = info.last_seen() else {
        return "never".dimmed().to_string();
    };
    let ago = Utc::now().signed_duration_since(seen);
    let text = format!("{} ({}s ago)", format_time(&seen), ago.num_seconds().max(0));
    // Matches the online indicator of the web console.
    if ago.num_minutes() < 15 {
        text.green().to_string()
    } else {
        text
    }
}
