// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic liveness signal to the hub.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hub::protocol::{PluginAction, TokenRequest};
use crate::registrar::{Reconnection, Registrar};

/// Result of one heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beat {
    /// Not registered; nothing sent.
    Skipped,
    Sent,
    /// Sending failed; the next tick tries again.
    Failed,
    /// The hub rejected the credential and the session was refreshed.
    Recovered(Reconnection),
}

/// Send one heartbeat with the current credentials.
pub async fn beat(registrar: &Registrar, callback_url: &str) -> Beat {
    let Some(creds) = registrar.session().credentials() else {
        debug!("not registered, skipping heartbeat");
        return Beat::Skipped;
    };
    let hub = registrar.hub();
    let url = hub.plugin_url(&creds.plugin_id, PluginAction::Heartbeat);
    let err = match hub.post(url, &TokenRequest { token: &creds.token }).await {
        Ok(_) => {
            debug!(plugin_id = %creds.plugin_id, "heartbeat sent");
            return Beat::Sent;
        }
        Err(e) => e,
    };

    if !err.is_credential_rejection() {
        warn!(plugin_id = %creds.plugin_id, err = %err, "heartbeat failed");
        return Beat::Failed;
    }
    warn!(plugin_id = %creds.plugin_id, "heartbeat rejected, refreshing session");
    match registrar.reconnect(callback_url).await {
        Ok(how) => {
            info!(?how, "session refreshed after heartbeat rejection");
            Beat::Recovered(how)
        }
        Err(e) => {
            warn!(err = %e, "session refresh failed");
            Beat::Failed
        }
    }
}

/// Spawn the heartbeat loop. The first beat fires one `period` after start.
pub fn spawn_heartbeat(
    registrar: Arc<Registrar>,
    callback_url: String,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }
            // Not abandoned on shutdown; a refresh may already have replaced
            // the credentials at the hub. Each hub call is bounded by the
            // request timeout.
            beat(&registrar, &callback_url).await;
        }
        debug!("heartbeat stopped");
    })
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
