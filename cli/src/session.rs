// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Connected session shared by the online commands
//!
//! Resolves configuration, builds the API client and wires Ctrl+C to a
//! cancellation token so in-flight requests and pollers stop promptly.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use console_core::application::poller::Poller;
use console_core::domain::console_config::ConsoleConfigManifest;
use console_core::infrastructure::api_client::ApiClient;

/// Loaded configuration plus the global connection flags.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub config: ConsoleConfigManifest,
    pub server: Option<String>,
}

pub struct Session {
    pub config: ConsoleConfigManifest,
    pub client: Arc<ApiClient>,
    pub cancel: CancellationToken,
}

impl Session {
    /// Build a client from the loaded configuration. Ctrl+C cancels the session.
    pub fn connect(options: ConnectOptions) -> Result<Self> {
        let config = resolve_config(options)?;

        let api_config = config
            .api_config()
            .context("Failed to resolve API client configuration")?;
        debug!(prefix = %api_config.api_prefix(), "Connecting to server");

        let client = ApiClient::new(api_config).context("Failed to create API client")?;

        Ok(Self {
            config,
            client: Arc::new(client),
            cancel: cancel_on_interrupt(),
        })
    }

    pub fn poller(&self) -> Poller {
        Poller::new(self.config.spec.polling.interval())
    }
}

/// Configuration with the `--server` override applied, validated.
pub fn resolve_config(options: ConnectOptions) -> Result<ConsoleConfigManifest> {
    let mut config = options.config;

    if let Some(server) = options.server {
        config.spec.server.url = server;
    }

    config
        .validate()
        .context("Configuration validation failed")?;

    Ok(config)
}

/// Token cancelled on the first Ctrl+C.
pub fn cancel_on_interrupt() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            result = signal::ctrl_c() => match result {
                Ok(()) => {
                    info!("Received Ctrl+C signal, cancelling");
                    trigger.cancel();
                }
                Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
            },
            _ = trigger.cancelled() => {}
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_server_flag_overrides_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "apiVersion: dfir-console/v1\nkind: ConsoleConfig\nmetadata:\n  name: lab\nspec:\n  server:\n    url: https://10.0.0.5:8889\n"
        )
        .unwrap();

        let config = resolve_config(ConnectOptions {
            config: ConsoleConfigManifest::from_yaml_file(file.path()).unwrap(),
            server: Some("http://127.0.0.1:9000".to_string()),
        })
        .unwrap();

        assert_eq!(config.spec.server.url, "http://127.0.0.1:9000");
        assert_eq!(config.metadata.name, "lab");
    }

    #[test]
    fn test_invalid_server_flag_is_rejected() {
        let result = resolve_config(ConnectOptions {
            config: ConsoleConfigManifest::default(),
            server: Some("not a url".to_string()),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_loaded_config_is_used_as_is() {
        let mut config = ConsoleConfigManifest::default();
        config.metadata.name = "preloaded".to_string();

        let resolved = resolve_config(ConnectOptions {
            config,
            server: None,
        })
        .unwrap();
        assert_eq!(resolved.metadata.name, "preloaded");
    }
}
