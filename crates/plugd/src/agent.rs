// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent lifecycle: bind, register, heartbeat, serve, stop.
//!
//! The listener serves before registration so pushes issued right after the
//! hub hands out credentials are not lost. Startup retries network failures
//! only; a hub that answers with an error status is not retried.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::ack::Acknowledger;
use crate::config::Config;
use crate::error::StartupError;
use crate::heartbeat::spawn_heartbeat;
use crate::hub::protocol::{ConfigResponse, PluginAction, TokenRequest};
use crate::hub::HubClient;
use crate::listener::dispatch::{ConfigSlot, EventHandler, LogHandler};
use crate::listener::{self, ListenerState};
use crate::registrar::Registrar;
use crate::session::{Credentials, SessionState};

/// A registered, running agent.
pub struct Agent {
    callback_url: String,
    addr: SocketAddr,
    hub: Arc<HubClient>,
    session: Arc<SessionState>,
    plugin_config: Arc<ConfigSlot>,
    tasks: TaskTracker,
    server: JoinHandle<()>,
    heartbeat: JoinHandle<()>,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
}

impl Agent {
    /// Bind the listener, register with the hub and start heartbeating.
    ///
    /// Returns once registered. `shutdown` stops startup (with
    /// [`StartupError::Cancelled`]) or, later, the running agent.
    pub async fn start(
        config: &Config,
        handler: Arc<dyn EventHandler>,
        plugin_config: Arc<ConfigSlot>,
        shutdown: CancellationToken,
    ) -> Result<Self, StartupError> {
        let hub = HubClient::connect(&config.hub_url, config.request_timeout())
            .map_err(|e| StartupError::Config(format!("invalid hub url: {e:#}")))?;
        let hub = Arc::new(hub);
        let session = Arc::new(SessionState::new());
        let registrar =
            Arc::new(Registrar::new(Arc::clone(&hub), Arc::clone(&session), config.name.clone()));

        let bound = listener::bind(&config.host, config.port).await?;
        let addr = bound.addr;
        let callback_url = listener::callback_url(config.advertised_host(), bound.port());

        let tasks = TaskTracker::new();
        let state = Arc::new(ListenerState {
            session: Arc::clone(&session),
            handler,
            acker: Acknowledger::new(Arc::clone(&hub), Arc::clone(&session)),
            tasks: tasks.clone(),
        });
        // Stops the listener again if startup fails.
        let serve_token = shutdown.child_token();
        let serve_guard = serve_token.clone().drop_guard();
        let server = listener::serve(bound, listener::build_router(state), serve_token);
        info!(%addr, callback = %callback_url, hub = %hub.base_url(), "callback listener serving");

        let creds = register_with_retry(
            &registrar,
            &callback_url,
            config.register_attempts,
            config.register_retry_delay(),
            &shutdown,
        )
        .await?;
        fetch_plugin_config(&hub, &creds, &plugin_config).await;

        let heartbeat = spawn_heartbeat(
            Arc::clone(&registrar),
            callback_url.clone(),
            config.heartbeat_interval(),
            shutdown.clone(),
        );
        serve_guard.disarm();

        Ok(Self {
            callback_url,
            addr,
            hub,
            session,
            plugin_config,
            tasks,
            server,
            heartbeat,
            shutdown,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    pub fn callback_url(&self) -> &str {
        &self.callback_url
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Plugin configuration last issued by the hub.
    pub fn plugin_config(&self) -> &Arc<ConfigSlot> {
        &self.plugin_config
    }

    /// Block until shutdown, then drain and tell the hub this plugin is gone.
    pub async fn wait(self) {
        self.shutdown.cancelled().await;
        info!("shutting down");

        match tokio::time::timeout(self.shutdown_timeout, self.server).await {
            Ok(Ok(())) => debug!("callback listener drained"),
            Ok(Err(e)) => warn!(err = %e, "callback listener task failed"),
            Err(_) => warn!("callback listener did not drain in time"),
        }
        if let Err(e) = self.heartbeat.await {
            warn!(err = %e, "heartbeat task failed");
        }

        self.tasks.close();
        if tokio::time::timeout(self.shutdown_timeout, self.tasks.wait()).await.is_err() {
            warn!(pending = self.tasks.len(), "abandoning unfinished acks");
        }

        notify_stop(&self.hub, &self.session).await;
    }
}

/// Run the agent with the default logging handler until `shutdown`.
pub async fn run(config: Config, shutdown: CancellationToken) -> Result<(), StartupError> {
    let plugin_config = Arc::new(ConfigSlot::new());
    let handler = Arc::new(LogHandler::new(Arc::clone(&plugin_config)));
    let agent = Agent::start(&config, handler, plugin_config, shutdown).await?;
    agent.wait().await;
    info!("stopped");
    Ok(())
}

async fn register_with_retry(
    registrar: &Registrar,
    callback_url: &str,
    attempts: u32,
    delay: Duration,
    shutdown: &CancellationToken,
) -> Result<Credentials, StartupError> {
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            _ = shutdown.cancelled() => return Err(StartupError::Cancelled),
            result = registrar.register(callback_url) => result,
        };
        let err = match result {
            Ok(creds) => return Ok(creds),
            Err(e) if !e.is_transient() => return Err(StartupError::Rejected(e)),
            Err(e) => e,
        };
        if attempt >= attempts {
            return Err(StartupError::Exhausted { attempts, last: err });
        }
        warn!(attempt, attempts, err = %err, "hub unreachable, retrying registration in {delay:?}");
        tokio::select! {
            _ = shutdown.cancelled() => return Err(StartupError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Best effort: a missing configuration never blocks startup.
async fn fetch_plugin_config(hub: &HubClient, creds: &Credentials, slot: &ConfigSlot) {
    let url = hub.plugin_url(&creds.plugin_id, PluginAction::Config);
    let value = match hub.get(url, &[("token", creds.token.as_str())]).await {
        Ok(value) => value,
        Err(e) => {
            warn!(plugin_id = %creds.plugin_id, err = %e, "failed to fetch plugin config");
            return;
        }
    };
    match serde_json::from_value::<ConfigResponse>(value) {
        Ok(resp) => {
            slot.set(resp.config);
            info!(plugin_id = %creds.plugin_id, "plugin config loaded");
        }
        Err(e) => warn!(plugin_id = %creds.plugin_id, err = %e, "malformed plugin config"),
    }
}

async fn notify_stop(hub: &HubClient, session: &SessionState) {
    let Some(creds) = session.credentials() else {
        debug!("not registered, no stop notification");
        return;
    };
    let url = hub.plugin_url(&creds.plugin_id, PluginAction::Stop);
    match hub.post(url, &TokenRequest { token: &creds.token }).await {
        Ok(_) => info!(plugin_id = %creds.plugin_id, "hub notified of stop"),
        Err(e) => warn!(plugin_id = %creds.plugin_id, err = %e, "stop notification failed"),
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
