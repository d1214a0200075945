// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! REST response and request shapes
//!
//! Typed views of the JSON bodies exchanged with the backend API. Shapes are
//! decoded once at the API boundary; unknown fields are ignored and missing
//! fields default, so newer servers stay readable.
//!
//! 64-bit counters and timestamps arrive as JSON numbers from some server
//! versions and as strings from others; both are accepted.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements typed API view-models

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::vfs_path::VfsPath;

mod lenient {
    use serde::{de, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Float(f64),
        Text(String),
    }

    pub fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        match Option::<NumberOrString>::deserialize(deserializer)? {
            None => Ok(0),
            Some(NumberOrString::Number(n)) => Ok(n),
            Some(NumberOrString::Float(f)) if f >= 0.0 => Ok(f as u64),
            Some(NumberOrString::Float(f)) => Err(de::Error::custom(format!(
                "expected unsigned integer, got {}",
                f
            ))),
            Some(NumberOrString::Text(s)) if s.is_empty() => Ok(0),
            Some(NumberOrString::Text(s)) => s.parse().map_err(de::Error::custom),
        }
    }
}

/// Convert a server timestamp in microseconds since the epoch.
pub fn micros_to_datetime(micros: u64) -> Option<DateTime<Utc>> {
    if micros == 0 {
        return None;
    }
    let micros = i64::try_from(micros).ok()?;
    Utc.timestamp_micros(micros).single()
}

// ============================================================================
// Clients
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiClientInfo {
    pub client_id: String,
    pub os_info: OsInfo,
    pub agent_information: AgentInformation,
    #[serde(deserialize_with = "lenient::number")]
    pub first_seen_at: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub last_seen_at: u64,
    pub last_ip: String,
    pub labels: Vec<String>,
}

impl ApiClientInfo {
    /// `last_seen_at` is reported in microseconds.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        micros_to_datetime(self.last_seen_at)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsInfo {
    pub system: String,
    pub hostname: String,
    pub fqdn: String,
    pub release: String,
    pub machine: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentInformation {
    pub version: String,
    pub name: String,
    pub build_time: String,
}

// ============================================================================
// Flows
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    #[default]
    Unset,
    Running,
    Finished,
    Error,
    #[serde(other)]
    Unknown,
}

impl FlowState {
    /// True once the flow can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Finished | FlowState::Error)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowContext {
    pub session_id: String,
    pub client_id: String,
    pub state: FlowState,
    pub status: String,
    #[serde(deserialize_with = "lenient::number")]
    pub create_time: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub start_time: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub active_time: u64,
    /// Nanoseconds.
    #[serde(deserialize_with = "lenient::number")]
    pub execution_duration: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_collected_rows: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_uploaded_files: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_uploaded_bytes: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_expected_uploaded_bytes: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub outstanding_requests: u64,
    pub artifacts_with_results: Vec<String>,
    pub request: ArtifactCollectorArgs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowDetails {
    pub context: FlowContext,
    pub available_downloads: AvailableDownloads,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailableDownloads {
    pub files: Vec<AvailableDownloadFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailableDownloadFile {
    pub name: String,
    pub path: String,
    #[serde(deserialize_with = "lenient::number")]
    pub size: u64,
    pub complete: bool,
    pub date: String,
}

/// Request body of `CollectArtifact`, also echoed back inside flows and hunts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactCollectorArgs {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub creator: String,
    pub artifacts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub specs: Vec<ArtifactSpec>,
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "is_zero")]
    pub timeout: u64,
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "is_zero")]
    pub max_rows: u64,
    #[serde(deserialize_with = "lenient::number", skip_serializing_if = "is_zero")]
    pub max_upload_bytes: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ops_per_second: Option<f64>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSpec {
    pub artifact: String,
    pub parameters: ArtifactParameters,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactParameters {
    pub env: Vec<ArtifactParameter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactParameter {
    pub key: String,
    pub value: String,
}

impl ArtifactCollectorArgs {
    /// Collection of `artifacts` on one client with default limits.
    pub fn for_client(client_id: impl Into<String>, artifacts: Vec<String>) -> Self {
        Self {
            client_id: client_id.into(),
            artifacts,
            ..Default::default()
        }
    }

    /// Set a parameter for `artifact`, creating its spec when needed.
    pub fn with_parameter(
        mut self,
        artifact: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let parameter = ArtifactParameter {
            key: key.into(),
            value: value.into(),
        };
        match self.specs.iter_mut().find(|spec| spec.artifact == artifact) {
            Some(spec) => spec.parameters.env.push(parameter),
            None => self.specs.push(ArtifactSpec {
                artifact: artifact.to_string(),
                parameters: ArtifactParameters {
                    env: vec![parameter],
                },
            }),
        }
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowIdResponse {
    pub flow_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowRef<'a> {
    pub client_id: &'a str,
    pub flow_id: &'a str,
}

// ============================================================================
// Hunts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HuntState {
    #[default]
    Unset,
    Paused,
    Running,
    Stopped,
    Archived,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hunt {
    pub hunt_id: String,
    pub hunt_description: String,
    pub creator: String,
    #[serde(deserialize_with = "lenient::number")]
    pub create_time: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub start_time: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub expires: u64,
    pub state: HuntState,
    pub stats: HuntStats,
    pub start_request: ArtifactCollectorArgs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntStats {
    #[serde(deserialize_with = "lenient::number")]
    pub total_clients_scheduled: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_clients_with_results: u64,
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntList {
    pub items: Vec<Hunt>,
}

/// Request body of `CreateHunt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HuntRequest {
    pub hunt_description: String,
    /// Microseconds since the epoch; zero lets the server pick.
    #[serde(skip_serializing_if = "is_zero", default)]
    pub expires: u64,
    pub start_request: ArtifactCollectorArgs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuntIdResponse {
    pub hunt_id: String,
}

// ============================================================================
// Virtual filesystem
// ============================================================================

/// `VFSListDirectory` / `VFSStatDirectory` body. Rows arrive as a JSON
/// document embedded in the `Response` string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsListing {
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Columns")]
    pub columns: Vec<String>,
    pub client_id: String,
    pub flow_id: String,
    #[serde(deserialize_with = "lenient::number")]
    pub timestamp: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub start_idx: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub end_idx: u64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_rows: u64,
}

impl VfsListing {
    /// Decode the embedded rows. An empty `Response` means no rows.
    pub fn entries(&self) -> Result<Vec<VfsEntry>, serde_json::Error> {
        if self.response.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&self.response)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size", deserialize_with = "lenient::number")]
    pub size: u64,
    #[serde(rename = "Mode")]
    pub mode: String,
    pub mtime: String,
    pub atime: String,
    pub ctime: String,
    #[serde(rename = "_FullPath")]
    pub full_path: String,
    #[serde(rename = "_Accessor")]
    pub accessor: String,
    #[serde(rename = "_Data")]
    pub data: HashMap<String, serde_json::Value>,
    #[serde(rename = "Download")]
    pub download: Option<serde_json::Value>,
}

impl VfsEntry {
    /// Directories and symlinks are both expandable in the tree.
    pub fn is_directory(&self) -> bool {
        matches!(self.mode.chars().next(), Some('d') | Some('L'))
    }

    pub fn is_downloaded(&self) -> bool {
        self.download
            .as_ref()
            .is_some_and(|download| !download.is_null())
    }
}

/// Body of `VFSRefreshDirectory`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshDirectoryRequest {
    pub client_id: String,
    pub vfs_components: Vec<String>,
    pub depth: u32,
}

impl RefreshDirectoryRequest {
    pub fn new(client_id: impl Into<String>, path: &VfsPath, depth: u32) -> Self {
        Self {
            client_id: client_id.into(),
            vfs_components: path.components().to_vec(),
            depth,
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableResponse {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
    #[serde(deserialize_with = "lenient::number")]
    pub total_rows: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRow {
    pub cell: Vec<serde_json::Value>,
}

impl TableRow {
    /// Cell text as shown in a table: strings verbatim, everything else as
    /// compact JSON.
    pub fn cell_text(&self, index: usize) -> String {
        match self.cell.get(index) {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Query of `GetTable` for a flow's artifact results.
#[derive(Debug, Clone, Serialize)]
pub struct TableRequest {
    pub client_id: String,
    pub flow_id: String,
    pub artifact: String,
    #[serde(rename = "type")]
    pub table_type: String,
    pub start_row: u64,
    pub rows: u64,
}

impl TableRequest {
    pub fn flow_results(
        client_id: impl Into<String>,
        flow_id: impl Into<String>,
        artifact: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            flow_id: flow_id.into(),
            artifact: artifact.into(),
            table_type: "CLIENT".to_string(),
            start_row: 0,
            rows: 100,
        }
    }
}
