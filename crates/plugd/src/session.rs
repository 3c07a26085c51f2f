// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared credential state for the hub session.

use parking_lot::RwLock;

/// Credential pair issued by the hub at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub plugin_id: String,
    pub token: String,
}

/// Current session credentials, shared by every component via `Arc`.
///
/// The pair lives in a single `Option` so readers see either no credentials
/// or a complete pair, never one half of an update.
#[derive(Debug, Default)]
pub struct SessionState {
    inner: RwLock<Option<Credentials>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both fields in one step.
    pub fn set(&self, plugin_id: impl Into<String>, token: impl Into<String>) {
        let creds = Credentials { plugin_id: plugin_id.into(), token: token.into() };
        *self.inner.write() = Some(creds);
    }

    /// Consistent copy of the current pair.
    pub fn snapshot(&self) -> Option<Credentials> {
        self.inner.read().clone()
    }

    /// Registered credentials only: `None` unless both fields are non-empty.
    pub fn credentials(&self) -> Option<Credentials> {
        self.snapshot().filter(|c| !c.plugin_id.is_empty() && !c.token.is_empty())
    }

    pub fn is_registered(&self) -> bool {
        self.inner.read().as_ref().is_some_and(|c| !c.plugin_id.is_empty() && !c.token.is_empty())
    }

    /// Current plugin id, if registered.
    pub fn plugin_id(&self) -> Option<String> {
        self.credentials().map(|c| c.plugin_id)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
