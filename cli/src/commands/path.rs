// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Offline VFS path codec commands
//!
//! Commands: split, join, url-encode, url-decode

use anyhow::{Context, Result};
use clap::Subcommand;

use console_core::domain::url_path::{
    decode_path_in_url, decode_url_path, encode_path_in_url, encode_url_path,
};
use console_core::domain::vfs_path::{join_components, split_components};

#[derive(Subcommand)]
pub enum PathCommand {
    /// Split an encoded path into its components
    Split {
        /// Encoded path, e.g. '/"\\.\C:"/Windows'
        #[arg(value_name = "PATH", allow_hyphen_values = true)]
        path: String,

        /// Print the components as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Join raw components into an encoded path
    Join {
        /// Components, root first
        #[arg(value_name = "COMPONENT", required = true, allow_hyphen_values = true)]
        components: Vec<String>,
    },

    /// Percent-encode a path for use in a URL
    UrlEncode {
        #[arg(value_name = "PATH", allow_hyphen_values = true)]
        path: String,

        /// Router-safe variant (no '%' in the output)
        #[arg(long)]
        router: bool,
    },

    /// Reverse url-encode
    UrlDecode {
        #[arg(value_name = "PATH", allow_hyphen_values = true)]
        path: String,

        /// Router-safe variant
        #[arg(long)]
        router: bool,
    },
}

pub fn handle_command(command: PathCommand) -> Result<()> {
    println!("{}", render(command)?);
    Ok(())
}

/// Output of a path command, without the trailing newline.
pub fn render(command: PathCommand) -> Result<String> {
    match command {
        PathCommand::Split { path, json } => {
            let components = split_components(&path);
            if json {
                serde_json::to_string(&components).context("Failed to serialize components")
            } else {
                Ok(components.join("\n"))
            }
        }
        PathCommand::Join { components } => Ok(join_components(&components)),
        PathCommand::UrlEncode { path, router } => Ok(if router {
            encode_path_in_url(&path)
        } else {
            encode_url_path(&path)
        }),
        PathCommand::UrlDecode { path, router } => {
            let decoded = if router {
                decode_path_in_url(&path)
            } else {
                decode_url_path(&path)
            };
            decoded.with_context(|| format!("Failed to decode '{}'", path))
        }
    }
}
