// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::io;

/// Failure of a single exchange with the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Connection refused, DNS failure or timeout. Transient.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The hub answered with a non-success status.
    #[error("hub returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The hub answered 2xx with a body that does not fit the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl HubError {
    /// Whether the failure happened below the HTTP layer and may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// HTTP status code, when the hub rejected the request.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The hub's way of saying "unknown plugin or wrong token".
    pub fn is_credential_rejection(&self) -> bool {
        self.status() == Some(400)
    }
}

/// An inbound event body that is not a JSON object. Recovered by the
/// listener as an empty payload; never reaches the hub.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Every local bind strategy for the callback listener failed.
#[derive(Debug, thiserror::Error)]
#[error("cannot bind callback listener on {host} (port {preferred}, then ephemeral): {source}")]
pub struct BindError {
    pub host: String,
    pub preferred: u16,
    #[source]
    pub source: io::Error,
}

/// Fatal outcomes of agent startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Bind(#[from] BindError),

    /// The hub refused registration (status or protocol error). Not retried.
    #[error("registration rejected: {0}")]
    Rejected(#[source] HubError),

    /// Every registration attempt failed with a network error.
    #[error("registration failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: HubError },

    /// Shutdown was requested before registration completed.
    #[error("shutdown requested during startup")]
    Cancelled,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
