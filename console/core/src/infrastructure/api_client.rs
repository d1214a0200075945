// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Backend REST client
//!
//! Thin, typed wrapper over the backend's JSON API.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Issue cancellable API calls and decode typed responses
//! - **Integration:** Console CLI → `ApiClient` → backend `/api/v1/*`
//!
//! Every call takes a [`CancellationToken`]. When the token fires first the
//! call returns [`ApiError::Cancelled`] and nothing from the response is
//! applied, including the CSRF token rotation.
//!
//! # Usage
//!
//! ```ignore
//! let client = ApiClient::new(ApiConfig::new("https://dfir.lab:8889")?)?;
//! let cancel = CancellationToken::new();
//! let info = client.get_client("C.1234", &cancel).await?;
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::vfs_tree::DirectoryLister;
use crate::domain::api::{
    ApiClientInfo, ArtifactCollectorArgs, FlowDetails, FlowIdResponse, FlowRef, HuntIdResponse,
    HuntList, HuntRequest, RefreshDirectoryRequest, TableRequest, TableResponse, VfsEntry,
    VfsListing,
};
use crate::domain::api_error::ApiError;
use crate::domain::console_config::ApiConfig;
use crate::domain::url_path::encode_url_path;
use crate::domain::vfs_path::VfsPath;

pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const UNAUTHORIZED_SUBJECT_HEADER: &str = "X-GRR-Unauthorized-Access-Subject";
pub const UNAUTHORIZED_REASON_HEADER: &str = "X-GRR-Unauthorized-Access-Reason";

const NO_QUERY: &[(&str, &str)] = &[];

/// Race `future` against `cancel`. Cancellation wins ties.
async fn cancellable<F: Future>(cancel: &CancellationToken, future: F) -> Result<F::Output, ApiError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::Cancelled),
        output = future => Ok(output),
    }
}

fn record(method: &'static str, outcome: &'static str) {
    metrics::counter!(
        "dfir_console_api_requests_total",
        "method" => method,
        "outcome" => outcome
    )
    .increment(1);
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::InvalidRequest(err.to_string())
    } else {
        ApiError::Unavailable(err.to_string())
    }
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Pull a human readable message out of an error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Client for the backend REST API.
pub struct ApiClient {
    client: Client,
    config: ApiConfig,
    /// Rotated by the server on GET responses.
    csrf_token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to create HTTP client: {}", e)))?;

        let csrf_token = RwLock::new(config.csrf_token.clone());
        Ok(Self {
            client,
            config,
            csrf_token,
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Token that will accompany the next state-changing request.
    pub fn csrf_token(&self) -> Option<String> {
        self.csrf_token.read().clone()
    }

    /// Absolute URL for an API path such as `v1/GetClient/C.1`.
    pub fn url(&self, api_path: &str) -> String {
        format!(
            "{}{}",
            self.config.api_prefix(),
            encode_url_path(api_path.trim_start_matches('/'))
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn log_request(&self, method: &str, url: &str) {
        if self.config.debug {
            info!(method, url, "API request");
        } else {
            debug!(method, url, "API request");
        }
    }

    /// Send and map non-success statuses onto [`ApiError`].
    async fn send(
        &self,
        method: &'static str,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        let result = cancellable(cancel, self.authorize(request).send()).await;
        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                record(method, "unavailable");
                warn!(method, error = %e, "API request failed");
                return Err(transport_error(e));
            }
            Err(cancelled) => {
                record(method, "cancelled");
                return Err(cancelled);
            }
        };

        let status = response.status();
        if status.is_success() {
            record(method, "ok");
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = cancellable(cancel, response.text())
            .await?
            .unwrap_or_default();

        if status == StatusCode::FORBIDDEN {
            record(method, "unauthorized");
            return Err(ApiError::Unauthorized {
                subject: header_text(&headers, UNAUTHORIZED_SUBJECT_HEADER).unwrap_or_default(),
                reason: header_text(&headers, UNAUTHORIZED_REASON_HEADER)
                    .unwrap_or_else(|| error_message(&body)),
            });
        }

        record(method, "error");
        Err(ApiError::Server {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    async fn read_body(response: Response, cancel: &CancellationToken) -> Result<String, ApiError> {
        cancellable(cancel, response.text())
            .await?
            .map_err(|e| ApiError::Unavailable(format!("Failed to read response body: {}", e)))
    }

    /// GET `api_path` and decode the JSON body.
    pub async fn get<T, Q>(
        &self,
        api_path: &str,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(api_path);
        self.log_request("GET", &url);

        let response = self
            .send("GET", self.client.get(&url).query(query), cancel)
            .await?;

        let token = header_text(response.headers(), CSRF_HEADER);
        let body = Self::read_body(response, cancel).await?;

        if let Some(token) = token {
            *self.csrf_token.write() = Some(token);
        }

        decode(&body)
    }

    /// POST a JSON body to `api_path`, carrying the current CSRF token.
    pub async fn post<T, B>(
        &self,
        api_path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url(api_path);
        self.log_request("POST", &url);

        let mut request = self.client.post(&url).json(body);
        if let Some(token) = self.csrf_token() {
            request = request.header(CSRF_HEADER, token);
        }

        let response = self.send("POST", request, cancel).await?;
        let body = Self::read_body(response, cancel).await?;
        decode(&body)
    }

    /// HEAD `api_path`, returning the response headers.
    pub async fn head<Q>(
        &self,
        api_path: &str,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<HeaderMap, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        let url = self.url(api_path);
        self.log_request("HEAD", &url);

        let response = self
            .send("HEAD", self.client.head(&url).query(query), cancel)
            .await?;
        Ok(response.headers().clone())
    }

    /// Download raw bytes after a HEAD preflight confirms access.
    pub async fn download<Q>(
        &self,
        api_path: &str,
        query: &Q,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ApiError>
    where
        Q: Serialize + ?Sized,
    {
        match self.head(api_path, query, cancel).await {
            Ok(_) => {}
            Err(ApiError::Server { status, .. }) => {
                return Err(ApiError::PreflightFailed { status });
            }
            Err(e) => return Err(e),
        }

        let url = self.url(api_path);
        self.log_request("GET", &url);
        let response = self
            .send("GET", self.client.get(&url).query(query), cancel)
            .await?;

        cancellable(cancel, response.bytes())
            .await?
            .map_err(|e| ApiError::Unavailable(format!("Download interrupted: {}", e)))
    }

    // ========================================================================
    // Typed endpoints
    // ========================================================================

    pub async fn get_client(
        &self,
        client_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ApiClientInfo, ApiError> {
        let info: ApiClientInfo = self
            .get(&format!("v1/GetClient/{}", client_id), NO_QUERY, cancel)
            .await?;

        // A stale or mismatched answer must not be shown as this client.
        if info.client_id != client_id {
            return Err(ApiError::Decode(format!(
                "GetClient returned '{}' for '{}'",
                info.client_id, client_id
            )));
        }
        Ok(info)
    }

    pub async fn list_directory(
        &self,
        client_id: &str,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<VfsListing, ApiError> {
        let vfs_path = path.to_string();
        self.get(
            &format!("v1/VFSListDirectory/{}", client_id),
            &[("vfs_path", vfs_path.as_str())],
            cancel,
        )
        .await
    }

    /// Schedule a directory refresh on the endpoint; returns the flow id.
    pub async fn refresh_directory(
        &self,
        client_id: &str,
        path: &VfsPath,
        depth: u32,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let request = RefreshDirectoryRequest::new(client_id, path, depth);
        let response: FlowIdResponse = self.post("v1/VFSRefreshDirectory", &request, cancel).await?;
        Ok(response.flow_id)
    }

    /// Listing as of the refresh flow `flow_id`.
    pub async fn stat_directory(
        &self,
        client_id: &str,
        path: &VfsPath,
        flow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<VfsListing, ApiError> {
        let mut query: Vec<(&str, &str)> = vec![("client_id", client_id)];
        query.extend(path.components().iter().map(|c| ("vfs_components", c.as_str())));
        query.push(("flow_id", flow_id));

        self.get("v1/VFSStatDirectory", &query, cancel).await
    }

    pub async fn get_flow_details(
        &self,
        client_id: &str,
        flow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<FlowDetails, ApiError> {
        self.get(
            "v1/GetFlowDetails",
            &FlowRef { client_id, flow_id },
            cancel,
        )
        .await
    }

    pub async fn collect_artifact(
        &self,
        args: &ArtifactCollectorArgs,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let response: FlowIdResponse = self.post("v1/CollectArtifact", args, cancel).await?;
        Ok(response.flow_id)
    }

    pub async fn cancel_flow(
        &self,
        client_id: &str,
        flow_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let _: serde_json::Value = self
            .post("v1/CancelFlow", &FlowRef { client_id, flow_id }, cancel)
            .await?;
        Ok(())
    }

    pub async fn list_hunts(
        &self,
        count: u64,
        offset: u64,
        cancel: &CancellationToken,
    ) -> Result<HuntList, ApiError> {
        self.get(
            "v1/ListHunts",
            &[("count", count), ("offset", offset)],
            cancel,
        )
        .await
    }

    pub async fn create_hunt(
        &self,
        request: &HuntRequest,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let response: HuntIdResponse = self.post("v1/CreateHunt", request, cancel).await?;
        Ok(response.hunt_id)
    }

    pub async fn get_table(
        &self,
        request: &TableRequest,
        cancel: &CancellationToken,
    ) -> Result<TableResponse, ApiError> {
        self.get("v1/GetTable", request, cancel).await
    }

    pub async fn download_vfs_file(
        &self,
        client_id: &str,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<Bytes, ApiError> {
        let vfs_path = path.to_string();
        self.download(
            "v1/DownloadVFSFile",
            &[("client_id", client_id), ("vfs_path", vfs_path.as_str())],
            cancel,
        )
        .await
    }
}

#[async_trait]
impl DirectoryLister for ApiClient {
    async fn list(
        &self,
        client_id: &str,
        path: &VfsPath,
        cancel: &CancellationToken,
    ) -> Result<Vec<VfsEntry>, ApiError> {
        let listing = self.list_directory(client_id, path, cancel).await?;
        listing
            .entries()
            .map_err(|e| ApiError::Decode(format!("VFS listing rows: {}", e)))
    }
}
