// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Flow commands
//!
//! Commands: show, watch, cancel, collect, results

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::time::Duration;

use console_core::domain::api::{
    ArtifactCollectorArgs, FlowContext, FlowState, TableRequest, TableResponse,
};

use super::{format_bytes, format_micros};
use crate::session::{ConnectOptions, Session};

#[derive(Subcommand)]
pub enum FlowCommand {
    /// Show flow status
    Show {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "FLOW_ID")]
        flow_id: String,
    },

    /// Poll a flow until it finishes (Ctrl+C stops watching)
    Watch {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "FLOW_ID")]
        flow_id: String,
    },

    /// Cancel a running flow
    Cancel {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "FLOW_ID")]
        flow_id: String,
    },

    /// Collect artifacts from a client
    Collect {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "ARTIFACT", required = true)]
        artifacts: Vec<String>,

        /// Artifact parameter as ARTIFACT:KEY=VALUE (repeatable)
        #[arg(short, long = "param", value_name = "ARTIFACT:KEY=VALUE", value_parser = parse_parameter)]
        params: Vec<ArtifactParam>,

        /// Collection timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Run ahead of queued collections
        #[arg(long)]
        urgent: bool,

        /// Wait for the flow to finish
        #[arg(short, long)]
        wait: bool,
    },

    /// Print the result rows of one artifact
    Results {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "FLOW_ID")]
        flow_id: String,

        #[arg(value_name = "ARTIFACT")]
        artifact: String,

        /// Maximum rows to fetch
        #[arg(long, default_value = "100")]
        rows: u64,
    },
}

/// One `--param` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactParam {
    pub artifact: String,
    pub key: String,
    pub value: String,
}

fn parse_parameter(raw: &str) -> Result<ArtifactParam, String> {
    let (artifact, assignment) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected ARTIFACT:KEY=VALUE, got '{}'", raw))?;
    let (key, value) = assignment
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE after ':', got '{}'", assignment))?;
    if artifact.is_empty() || key.is_empty() {
        return Err(format!("artifact and key must not be empty in '{}'", raw));
    }
    Ok(ArtifactParam {
        artifact: artifact.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    })
}

pub async fn handle_command(command: FlowCommand, options: ConnectOptions) -> Result<()> {
    let session = Session::connect(options)?;

    match command {
        FlowCommand::Show { client_id, flow_id } => show(&session, &client_id, &flow_id).await,
        FlowCommand::Watch { client_id, flow_id } => watch(&session, &client_id, &flow_id).await,
        FlowCommand::Cancel { client_id, flow_id } => {
            cancel(&session, &client_id, &flow_id).await
        }
        FlowCommand::Collect {
            client_id,
            artifacts,
            params,
            timeout,
            urgent,
            wait,
        } => {
            let mut args = ArtifactCollectorArgs::for_client(client_id.clone(), artifacts);
            for param in params {
                args = args.with_parameter(&param.artifact, param.key, param.value);
            }
            args.timeout = timeout.unwrap_or_default();
            args.urgent = urgent;
            collect(&session, &client_id, &args, wait).await
        }
        FlowCommand::Results {
            client_id,
            flow_id,
            artifact,
            rows,
        } => {
            let mut request = TableRequest::flow_results(client_id, flow_id, artifact);
            request.rows = rows;
            results(&session, &request).await
        }
    }
}

async fn show(session: &Session, client_id: &str, flow_id: &str) -> Result<()> {
    let details = session
        .client
        .get_flow_details(client_id, flow_id, &session.cancel)
        .await
        .with_context(|| format!("Failed to fetch flow {}", flow_id))?;

    print_flow(&details.context);

    let files = &details.available_downloads.files;
    if !files.is_empty() {
        println!("  Downloads:");
        for file in files {
            println!("    {} ({})", file.name, format_bytes(file.size));
        }
    }
    Ok(())
}

async fn watch(session: &Session, client_id: &str, flow_id: &str) -> Result<()> {
    let client = &session.client;
    let cancel = &session.cancel;
    let mut last_line = String::new();

    println!("Watching flow {} (Ctrl+C to stop)...", flow_id.bold());

    let details = session
        .poller()
        .run(
            cancel,
            || client.get_flow_details(client_id, flow_id, cancel),
            |details| {
                let line = progress_line(&details.context);
                if line != last_line {
                    println!("  {}", line);
                    last_line = line;
                }
            },
            |details| details.context.state.is_terminal(),
        )
        .await;

    match details {
        Some(details) => {
            print_flow(&details.context);
            if details.context.state == FlowState::Error {
                return Err(anyhow!("Flow {} failed: {}", flow_id, details.context.status));
            }
        }
        None => println!("{}", "Stopped watching".yellow()),
    }
    Ok(())
}

async fn cancel(session: &Session, client_id: &str, flow_id: &str) -> Result<()> {
    session
        .client
        .cancel_flow(client_id, flow_id, &session.cancel)
        .await
        .with_context(|| format!("Failed to cancel flow {}", flow_id))?;

    println!("{}", format!("✓ Flow {} cancelled", flow_id).green());
    Ok(())
}

async fn collect(
    session: &Session,
    client_id: &str,
    args: &ArtifactCollectorArgs,
    wait: bool,
) -> Result<()> {
    println!(
        "Collecting {} on {}...",
        args.artifacts.join(", ").bold(),
        client_id
    );

    let flow_id = session
        .client
        .collect_artifact(args, &session.cancel)
        .await
        .context("Failed to schedule collection")?;

    println!("{}", format!("✓ Flow started: {}", flow_id).green());

    if wait {
        watch(session, client_id, &flow_id).await?;
    }
    Ok(())
}

async fn results(session: &Session, request: &TableRequest) -> Result<()> {
    let table = session
        .client
        .get_table(request, &session.cancel)
        .await
        .with_context(|| format!("Failed to fetch results of {}", request.artifact))?;

    print_table(&table);
    Ok(())
}

fn print_flow(context: &FlowContext) {
    println!("Flow {}", context.session_id.bold());
    println!("  State: {}", format_state(context.state));
    if !context.status.is_empty() {
        println!("  Status: {}", context.status);
    }
    println!("  Artifacts: {}", context.request.artifacts.join(", "));
    println!("  Created: {}", format_micros(context.create_time));
    if context.execution_duration > 0 {
        let duration = Duration::from_nanos(context.execution_duration);
        println!("  Duration: {:.1}s", duration.as_secs_f64());
    }
    println!("  Rows: {}", context.total_collected_rows);
    println!(
        "  Uploaded: {} files, {}",
        context.total_uploaded_files,
        format_bytes(context.total_uploaded_bytes)
    );
}

fn progress_line(context: &FlowContext) -> String {
    let mut line = format!(
        "{} rows={} files={}",
        format_state(context.state),
        context.total_collected_rows,
        context.total_uploaded_files
    );
    if context.total_expected_uploaded_bytes > 0 {
        let percent = u128::from(context.total_uploaded_bytes) * 100
            / u128::from(context.total_expected_uploaded_bytes);
        line.push_str(&format!(" upload={}%", percent.min(100)));
    }
    line
}

fn format_state(state: FlowState) -> colored::ColoredString {
    match state {
        FlowState::Running => "RUNNING".yellow(),
        FlowState::Finished => "FINISHED".green(),
        FlowState::Error => "ERROR".red(),
        FlowState::Unset => "UNSET".normal(),
        FlowState::Unknown => "UNKNOWN".dimmed(),
    }
}

fn print_table(table: &TableResponse) {
    if table.rows.is_empty() {
        println!("{}", "No results".yellow());
        return;
    }

    println!("{}", table.columns.join("\t").bold());
    for row in &table.rows {
        let cells: Vec<String> = (0..table.columns.len().max(row.cell.len()))
            .map(|index| row.cell_text(index))
            .collect();
        println!("{}", cells.join("\t"));
    }
    if table.total_rows > table.rows.len() as u64 {
        println!(
            "{}",
            format!("({} of {} rows)", table.rows.len(), table.total_rows).dimmed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parameter() {
        assert_eq!(
            parse_parameter("Windows.Search.FileFinder:SearchFilesGlob=C:\\Users\\**").unwrap(),
            ArtifactParam {
                artifact: "Windows.Search.FileFinder".to_string(),
                key: "SearchFilesGlob".to_string(),
                value: "C:\\Users\\**".to_string(),
            }
        );
        assert!(parse_parameter("NoColon=1").is_err());
        assert!(parse_parameter("Artifact:novalue").is_err());
        assert!(parse_parameter(":Key=1").is_err());
    }

    #[test]
    fn test_progress_line_caps_percentage() {
        colored::control::set_override(false);
        let context = FlowContext {
            state: FlowState::Running,
            total_collected_rows: 10,
            total_uploaded_files: 2,
            total_uploaded_bytes: 300,
            total_expected_uploaded_bytes: 200,
            ..Default::default()
        };
        assert_eq!(progress_line(&context), "RUNNING rows=10 files=2 upload=100%");
    }

    #[test]
    fn test_progress_line_handles_huge_byte_counts() {
        colored::control::set_override(false);
        let context = FlowContext {
            state: FlowState::Running,
            total_uploaded_bytes: u64::MAX / 2,
            total_expected_uploaded_bytes: u64::MAX,
            ..Default::default()
        };
        assert_eq!(progress_line(&context), "RUNNING rows=0 files=0 upload=49%");
    }
}
