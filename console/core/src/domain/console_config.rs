// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Console Configuration Types
//
// Defines the configuration schema for the DFIR console, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Backend server location, base path and credentials
// - Polling cadence for flow/hunt/file state
// - Debug and logging settings
//
// The HTTP client never reads ambient state: everything it needs is
// resolved into an `ApiConfig` and handed over at construction time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const API_VERSION: &str = "dfir-console/v1";
pub const KIND: &str = "ConsoleConfig";
pub const CONFIG_PATH_ENV: &str = "DFIR_CONSOLE_CONFIG_PATH";

const MIN_POLL_INTERVAL_MS: u64 = 1_000;
const MAX_POLL_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Environment variable '{0}' referenced by configuration is not set")]
    MissingEnv(String),
}

/// Top-level Kubernetes-style console configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfigManifest {
    /// API version (must be "dfir-console/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ConsoleConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: ConsoleConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable profile name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsoleConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    /// Verbose request logging
    #[serde(default)]
    pub debug: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Backend origin, e.g. "https://velociraptor.corp:8889"
    #[serde(default = "default_server_url")]
    pub url: String,

    /// Path prefix the GUI is mounted under ("" or "/prefix")
    #[serde(default)]
    pub base_path: String,

    /// Bearer key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Anti-forgery token to start with; replaced by tokens the server sends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Skip TLS verification (self-signed lab servers only)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            base_path: String::new(),
            api_key: None,
            csrf_token: None,
            timeout_seconds: default_timeout_seconds(),
            accept_invalid_certs: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_server_url() -> String {
    "https://127.0.0.1:8889".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for ConsoleConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "dfir-console".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: ConsoleConfigSpec::default(),
        }
    }
}

impl ConsoleConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Candidate configuration locations, in precedence order.
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(path));
        }

        paths.push(PathBuf::from("./dfir-console.yaml"));

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".dfir-console").join("config.yaml"));
        }

        #[cfg(unix)]
        paths.push(PathBuf::from("/etc/dfir-console/config.yaml"));
        #[cfg(windows)]
        paths.push(PathBuf::from("C:\\ProgramData\\DfirConsole\\config.yaml"));

        paths
    }

    /// Discover configuration file using precedence order
    /// 1. DFIR_CONSOLE_CONFIG_PATH environment variable
    /// 2. ./dfir-console.yaml (working directory)
    /// 3. ~/.dfir-console/config.yaml (user home)
    /// 4. /etc/dfir-console/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| path.exists())
    }

    /// File [`Self::load_or_default`] reads: the explicit path, else the discovered one.
    pub fn source_path(cli_path: Option<&Path>) -> Option<PathBuf> {
        cli_path.map(Path::to_path_buf).or_else(Self::discover_config)
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        // Explicit path must load.
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(config_path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", config_path);
                Self::from_yaml_file(config_path)?
            }
            None => {
                tracing::debug!("No configuration file found in standard locations. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DFIR_CONSOLE_SERVER_URL") {
            tracing::info!("Environment override: DFIR_CONSOLE_SERVER_URL={}", url);
            self.spec.server.url = url;
        }

        if let Some(val) = lookup("DFIR_CONSOLE_DEBUG") {
            match parse_flag(&val) {
                Some(flag) => {
                    tracing::info!("Environment override: DFIR_CONSOLE_DEBUG={}", flag);
                    self.spec.debug = flag;
                }
                None => {
                    tracing::warn!(
                        "Invalid value for DFIR_CONSOLE_DEBUG: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != API_VERSION {
            return Err(ConfigError::Invalid(format!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version, API_VERSION
            )));
        }

        if self.kind != KIND {
            return Err(ConfigError::Invalid(format!(
                "Invalid kind: '{}'. Must be '{}'",
                self.kind, KIND
            )));
        }

        if self.metadata.name.is_empty() {
            return Err(ConfigError::Invalid("metadata.name cannot be empty".to_string()));
        }

        let server = &self.spec.server;
        let url = Url::parse(&server.url).map_err(|e| {
            ConfigError::Invalid(format!("spec.server.url '{}' is not a URL: {}", server.url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "spec.server.url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if !server.base_path.is_empty() && !server.base_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "spec.server.base_path must start with '/': '{}'",
                server.base_path
            )));
        }

        if server.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "spec.server.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        let interval = self.spec.polling.interval_ms;
        if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&interval) {
            return Err(ConfigError::Invalid(format!(
                "spec.polling.interval_ms must be between {} and {}, got {}",
                MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS, interval
            )));
        }

        Ok(())
    }

    /// Resolve the client configuration, expanding `env:` references.
    pub fn api_config(&self) -> Result<ApiConfig, ConfigError> {
        let server = &self.spec.server;
        let api_key = server.api_key.as_deref().map(resolve_secret).transpose()?;

        let mut config = ApiConfig::new(&server.url)?
            .with_base_path(&server.base_path)
            .with_timeout(Duration::from_secs(server.timeout_seconds))
            .with_debug(self.spec.debug);
        config.api_key = api_key;
        config.csrf_token = server.csrf_token.clone();
        config.accept_invalid_certs = server.accept_invalid_certs;
        Ok(config)
    }
}

/// Explicit configuration for the API client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub server_url: Url,
    /// Empty or starting with `/`, without a trailing `/`.
    pub base_path: String,
    /// Initial anti-forgery token.
    pub csrf_token: Option<String>,
    pub api_key: Option<String>,
    pub debug: bool,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl ApiConfig {
    pub fn new(server_url: &str) -> Result<Self, ConfigError> {
        let server_url = Url::parse(server_url).map_err(|e| {
            ConfigError::Invalid(format!("server url '{}' is not a URL: {}", server_url, e))
        })?;
        Ok(Self {
            server_url,
            base_path: String::new(),
            csrf_token: None,
            api_key: None,
            debug: false,
            timeout: Duration::from_secs(default_timeout_seconds()),
            accept_invalid_certs: false,
        })
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.trim_end_matches('/').to_string();
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<origin><base_path>/api/`
    pub fn api_prefix(&self) -> String {
        format!(
            "{}{}/api/",
            self.server_url.as_str().trim_end_matches('/'),
            self.base_path
        )
    }
}

fn resolve_secret(value: &str) -> Result<String, ConfigError> {
    match value.strip_prefix("env:") {
        Some(var) => std::env::var(var).map_err(|_| ConfigError::MissingEnv(var.to_string())),
        None => Ok(value.to_string()),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
