// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort event acknowledgment.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::hub::protocol::{AckRequest, PluginAction};
use crate::hub::HubClient;
use crate::session::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Not registered; nothing sent.
    Skipped,
    Sent,
    /// The hub was unreachable or refused the ack. Logged and dropped.
    Failed,
}

/// Tells the hub an event was processed. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Acknowledger {
    hub: Arc<HubClient>,
    session: Arc<SessionState>,
}

impl Acknowledger {
    pub fn new(hub: Arc<HubClient>, session: Arc<SessionState>) -> Self {
        Self { hub, session }
    }

    pub async fn ack(&self, event_id: &str) -> AckOutcome {
        let Some(creds) = self.session.credentials() else {
            debug!(event_id, "not registered, skipping ack");
            return AckOutcome::Skipped;
        };
        let url = self.hub.plugin_url(&creds.plugin_id, PluginAction::Ack);
        let request = AckRequest { token: &creds.token, event_id };
        match self.hub.post(url, &request).await {
            Ok(_) => {
                debug!(plugin_id = %creds.plugin_id, event_id, "event acked");
                AckOutcome::Sent
            }
            Err(e) => {
                warn!(plugin_id = %creds.plugin_id, event_id, err = %e, "event ack failed");
                AckOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
#[path = "ack_tests.rs"]
mod tests;
