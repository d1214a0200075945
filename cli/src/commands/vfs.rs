// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Virtual filesystem commands
//!
//! Commands: ls, refresh, download, tree

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use console_core::application::vfs_tree::{DirectoryLister, TreeLevel, VfsTree};
use console_core::domain::api::VfsEntry;
use console_core::domain::vfs_path::{VfsPath, VfsRoute};

use super::format_bytes;
use crate::session::{ConnectOptions, Session};

#[derive(Subcommand)]
pub enum VfsCommand {
    /// List a directory as last collected
    Ls {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        /// Encoded VFS path (default: root)
        #[arg(value_name = "PATH", default_value = "/")]
        path: String,
    },

    /// Ask the endpoint to re-list a directory
    Refresh {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "PATH")]
        path: String,

        /// Recursion depth below PATH
        #[arg(long, default_value = "0")]
        depth: u32,

        /// Wait for the refresh to finish and print the new listing
        #[arg(short, long)]
        wait: bool,
    },

    /// Download a collected file
    Download {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "PATH")]
        path: String,

        /// Output file (default: file name in the current directory)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the directory tree down to PATH
    Tree {
        #[arg(value_name = "CLIENT_ID")]
        client_id: String,

        #[arg(value_name = "PATH", default_value = "/")]
        path: String,
    },
}

pub async fn handle_command(command: VfsCommand, options: ConnectOptions) -> Result<()> {
    let session = Session::connect(options)?;

    match command {
        VfsCommand::Ls { client_id, path } => ls(&session, &client_id, &VfsPath::parse(&path)).await,
        VfsCommand::Refresh {
            client_id,
            path,
            depth,
            wait,
        } => refresh(&session, &client_id, &VfsPath::parse(&path), depth, wait).await,
        VfsCommand::Download {
            client_id,
            path,
            output,
        } => download(&session, &client_id, &VfsPath::parse(&path), output).await,
        VfsCommand::Tree { client_id, path } => {
            tree(&session, &client_id, &VfsPath::parse(&path)).await
        }
    }
}

async fn ls(session: &Session, client_id: &str, path: &VfsPath) -> Result<()> {
    let entries = session
        .client
        .list(client_id, path, &session.cancel)
        .await
        .with_context(|| format!("Failed to list '{}'", path))?;

    print_listing(path, &entries);
    Ok(())
}

async fn refresh(
    session: &Session,
    client_id: &str,
    path: &VfsPath,
    depth: u32,
    wait: bool,
) -> Result<()> {
    let client = &session.client;
    let cancel = &session.cancel;

    let flow_id = client
        .refresh_directory(client_id, path, depth, cancel)
        .await
        .context("Failed to schedule directory refresh")?;

    println!(
        "{}",
        format!("✓ Refresh scheduled: {}", flow_id).green()
    );

    if !wait {
        return Ok(());
    }

    println!("Waiting for completion...");
    let details = session
        .poller()
        .run(
            cancel,
            || client.get_flow_details(client_id, &flow_id, cancel),
            |_| {},
            |details| details.context.state.is_terminal(),
        )
        .await;

    let Some(details) = details else {
        println!("{}", "Stopped waiting".yellow());
        return Ok(());
    };
    if !details.context.status.is_empty() {
        println!("Status: {}", details.context.status);
    }

    let listing = client
        .stat_directory(client_id, path, &flow_id, cancel)
        .await
        .context("Failed to fetch refreshed listing")?;
    let entries = listing
        .entries()
        .context("Server returned malformed listing rows")?;

    print_listing(path, &entries);
    Ok(())
}

async fn download(
    session: &Session,
    client_id: &str,
    path: &VfsPath,
    output: Option<PathBuf>,
) -> Result<()> {
    let output = match output {
        Some(output) => output,
        None => match path.file_name() {
            Some(name) => PathBuf::from(sanitize_file_name(name)),
            None => bail!("Cannot download the VFS root"),
        },
    };

    let bytes = session
        .client
        .download_vfs_file(client_id, path, &session.cancel)
        .await
        .with_context(|| format!("Failed to download '{}'", path))?;

    std::fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write download to {:?}", output))?;

    println!(
        "{}",
        format!(
            "✓ Downloaded {} ({}) to {}",
            path,
            format_bytes(bytes.len() as u64),
            output.display()
        )
        .green()
    );
    Ok(())
}

async fn tree(session: &Session, client_id: &str, path: &VfsPath) -> Result<()> {
    let lister: Arc<dyn DirectoryLister> = session.client.clone();
    let tree = VfsTree::new(lister, client_id);

    let levels = tree
        .expand_to(path, &session.cancel)
        .await
        .with_context(|| format!("Failed to expand '{}'", path))?;

    let Some(reached) = levels.last().map(|level| level.path.clone()) else {
        return Ok(());
    };

    println!("{}", "/".bold());
    print_tree(&levels, 0);

    println!();
    println!(
        "Route: {}",
        VfsRoute::directory(reached.clone()).to_url(client_id)
    );
    if &reached != path {
        println!(
            "{}",
            format!("Stopped at {}: '{}' is not a directory", reached.to_folder_string(), path)
                .yellow()
        );
    }
    Ok(())
}

/// Print level `depth`, descending into the child that the next level expands.
fn print_tree(levels: &[TreeLevel], depth: usize) {
    let Some(level) = levels.get(depth) else {
        return;
    };
    let next = levels.get(depth + 1).map(|next| &next.path);
    let indent = "  ".repeat(depth + 1);

    for child in level.subdirectories() {
        let name = child.file_name().unwrap_or_default().to_string();
        if Some(&child) == next {
            println!("{}▾ {}/", indent, name.bold());
            print_tree(levels, depth + 1);
        } else {
            println!("{}▸ {}/", indent, name);
        }
    }
}

fn print_listing(path: &VfsPath, entries: &[VfsEntry]) {
    println!("{}", path.to_folder_string().bold());

    if entries.is_empty() {
        println!("{}", "  (empty, try `dfir vfs refresh`)".dimmed());
        return;
    }

    for entry in entries {
        let name = if entry.is_directory() {
            format!("{}/", entry.name).blue().bold()
        } else if entry.is_downloaded() {
            entry.name.green()
        } else {
            entry.name.normal()
        };
        println!(
            "  {:<11} {:>10}  {:<25} {}",
            entry.mode,
            format_bytes(entry.size),
            entry.mtime,
            name
        );
    }
}

/// Local file name for a VFS component; separators would escape the
/// working directory.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}
