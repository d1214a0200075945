// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! API error taxonomy shared by the HTTP client and the services built on it.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Connection refused, DNS failure, timeout.
    #[error("Server unavailable: {0}")]
    Unavailable(String),

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    /// HTTP 403 with the subject and reason reported by the server.
    #[error("Unauthorized access to '{subject}': {reason}")]
    Unauthorized { subject: String, reason: String },

    /// The HEAD check before a download was rejected.
    #[error("Download rejected by preflight check (HTTP {status})")]
    PreflightFailed { status: u16 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ApiError::Cancelled)
    }
}
