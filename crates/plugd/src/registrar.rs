// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registration and reconnection against the hub.
//!
//! The only writer of [`SessionState`]. A reconnect the hub answers with 400
//! means the credential is stale; the registrar then registers afresh and
//! overwrites the old pair in one step.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::HubError;
use crate::hub::protocol::{
    PluginAction, ReconnectRequest, RegisterRequest, RegisterResponse, CAPABILITIES,
};
use crate::hub::HubClient;
use crate::session::{Credentials, SessionState};

/// Result of a single reconnect exchange.
#[derive(Debug)]
pub enum ReconnectOutcome {
    Reconnected,
    /// The hub rejected the token or no longer knows the plugin id.
    CredentialInvalid,
    Failed(HubError),
}

/// Which path [`Registrar::reconnect`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconnection {
    /// No credentials were held; registered fresh.
    Registered,
    /// The hub accepted the existing credentials.
    Resumed,
    /// The existing credentials were rejected; registered fresh.
    Reregistered,
}

pub struct Registrar {
    hub: Arc<HubClient>,
    session: Arc<SessionState>,
    name: String,
}

impl Registrar {
    pub fn new(hub: Arc<HubClient>, session: Arc<SessionState>, name: impl Into<String>) -> Self {
        Self { hub, session, name: name.into() }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn hub(&self) -> &Arc<HubClient> {
        &self.hub
    }

    /// Register with the hub and store the issued credentials.
    pub async fn register(&self, callback_url: &str) -> Result<Credentials, HubError> {
        let request =
            RegisterRequest { name: &self.name, callback_url, capabilities: &CAPABILITIES };
        let value = self.hub.post(self.hub.register_url(), &request).await?;
        let creds = parse_registration(value)?;
        self.session.set(creds.plugin_id.clone(), creds.token.clone());
        info!(plugin_id = %creds.plugin_id, callback = %callback_url, "registered with hub");
        Ok(creds)
    }

    /// Refresh the session at the hub, re-registering if the credential is stale.
    pub async fn reconnect(&self, callback_url: &str) -> Result<Reconnection, HubError> {
        let Some(creds) = self.session.credentials() else {
            self.register(callback_url).await?;
            return Ok(Reconnection::Registered);
        };

        match self.try_reconnect(&creds, callback_url).await {
            ReconnectOutcome::Reconnected => {
                info!(plugin_id = %creds.plugin_id, callback = %callback_url, "reconnected to hub");
                Ok(Reconnection::Resumed)
            }
            ReconnectOutcome::CredentialInvalid => {
                warn!(plugin_id = %creds.plugin_id, "hub rejected credentials, re-registering");
                self.register(callback_url).await?;
                Ok(Reconnection::Reregistered)
            }
            ReconnectOutcome::Failed(e) => Err(e),
        }
    }

    /// One reconnect exchange, classified.
    pub async fn try_reconnect(&self, creds: &Credentials, callback_url: &str) -> ReconnectOutcome {
        let url = self.hub.plugin_url(&creds.plugin_id, PluginAction::Reconnect);
        let request =
            ReconnectRequest { token: &creds.token, callback_url, capabilities: &CAPABILITIES };
        match self.hub.post(url, &request).await {
            Ok(_) => ReconnectOutcome::Reconnected,
            Err(e) if e.is_credential_rejection() => {
                debug!(plugin_id = %creds.plugin_id, err = %e, "reconnect rejected");
                ReconnectOutcome::CredentialInvalid
            }
            Err(e) => ReconnectOutcome::Failed(e),
        }
    }
}

fn parse_registration(value: serde_json::Value) -> Result<Credentials, HubError> {
    let resp: RegisterResponse = serde_json::from_value(value)
        .map_err(|e| HubError::Protocol(format!("malformed registration response: {e}")))?;
    let plugin_id = resp.plugin_id.filter(|s| !s.is_empty());
    let token = resp.token.filter(|s| !s.is_empty());
    match (plugin_id, token) {
        (Some(plugin_id), Some(token)) => Ok(Credentials { plugin_id, token }),
        (None, None) => Err(missing("plugin_id and token")),
        (None, Some(_)) => Err(missing("plugin_id")),
        (Some(_), None) => Err(missing("token")),
    }
}

fn missing(fields: &str) -> HubError {
    HubError::Protocol(format!("registration response missing {fields}"))
}

#[cfg(test)]
#[path = "registrar_tests.rs"]
mod tests;
