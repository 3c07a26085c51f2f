// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scriptable fake hub, a recording event
//! handler, and assertion helpers.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::listener::dispatch::{EventCategory, EventHandler};
use crate::listener::event::CallbackEvent;

/// One request received by [`FakeHub`].
#[derive(Debug, Clone)]
pub struct HubCall {
    pub method: Method,
    /// `register`, `reconnect`, `heartbeat`, `ack`, `stop`, `config` or `unknown`.
    pub action: String,
    /// Plugin id from the path (`None` for `register`).
    pub plugin_id: Option<String>,
    pub query: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct Script {
    sticky: HashMap<String, u16>,
    once: HashMap<String, VecDeque<u16>>,
    register_body: Option<Value>,
    delays: HashMap<String, Duration>,
    config: Value,
    registrations: u32,
}

impl Script {
    fn status_for(&mut self, action: &str) -> Option<u16> {
        if let Some(code) = self.once.get_mut(action).and_then(VecDeque::pop_front) {
            return Some(code);
        }
        self.sticky.get(action).copied()
    }
}

struct Shared {
    calls: Mutex<Vec<HubCall>>,
    script: Mutex<Script>,
}

/// In-process hub speaking the `/v1/plugins` API on an ephemeral port.
///
/// Every request is recorded. Registration issues fresh credentials
/// (`plg_1`/`tok_1`, `plg_2`/`tok_2`, ...); every other action answers 200
/// unless a status is scripted with [`respond`](Self::respond) or
/// [`respond_once`](Self::respond_once).
pub struct FakeHub {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl FakeHub {
    pub async fn start() -> anyhow::Result<Self> {
        Self::bind("127.0.0.1:0").await
    }

    /// Start on a specific address (e.g. a port the agent is already retrying).
    pub async fn bind(addr: &str) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let shared = Arc::new(Shared {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Script { config: json!({}), ..Script::default() }),
        });
        let router = Router::new().fallback(handle).with_state(Arc::clone(&shared));
        let shutdown = CancellationToken::new();
        let sd = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).with_graceful_shutdown(sd.cancelled_owned()).await;
        });
        Ok(Self { addr, shared, shutdown })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Answer every future `action` request with `status`.
    pub fn respond(&self, action: &str, status: u16) {
        self.shared.script.lock().sticky.insert(action.to_owned(), status);
    }

    /// Answer the next `action` request with `status`, then fall back.
    pub fn respond_once(&self, action: &str, status: u16) {
        self.shared.script.lock().once.entry(action.to_owned()).or_default().push_back(status);
    }

    /// Hold every `action` response for `delay` (the call is recorded first).
    pub fn delay(&self, action: &str, delay: Duration) {
        self.shared.script.lock().delays.insert(action.to_owned(), delay);
    }

    /// Replace the registration response body.
    pub fn register_body(&self, body: Value) {
        self.shared.script.lock().register_body = Some(body);
    }

    /// Configuration served by `GET /v1/plugins/{id}/config`.
    pub fn set_config(&self, config: Value) {
        self.shared.script.lock().config = config;
    }

    pub fn calls(&self) -> Vec<HubCall> {
        self.shared.calls.lock().clone()
    }

    pub fn calls_to(&self, action: &str) -> Vec<HubCall> {
        self.shared.calls.lock().iter().filter(|c| c.action == action).cloned().collect()
    }

    pub fn actions(&self) -> Vec<String> {
        self.shared.calls.lock().iter().map(|c| c.action.clone()).collect()
    }

    /// Wait until at least `count` calls to `action` were recorded.
    pub async fn wait_for(
        &self,
        action: &str,
        count: usize,
        timeout: Duration,
    ) -> anyhow::Result<Vec<HubCall>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let calls = self.calls_to(action);
            if calls.len() >= count {
                return Ok(calls);
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!(
                    "expected {count} {action} call(s) within {timeout:?}, saw {} (all: {:?})",
                    calls.len(),
                    self.actions()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    let (action, plugin_id) = match segments.as_slice() {
        ["v1", "plugins", "register"] => ("register".to_owned(), None),
        ["v1", "plugins", id, action] => ((*action).to_owned(), Some((*id).to_owned())),
        _ => ("unknown".to_owned(), None),
    };
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    shared.calls.lock().push(HubCall {
        method,
        action: action.clone(),
        plugin_id,
        query: uri.query().map(str::to_owned),
        body,
    });

    let delay = shared.script.lock().delays.get(&action).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut script = shared.script.lock();
    if let Some(code) = script.status_for(&action) {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(json!({ "error": format!("scripted {code}") }))).into_response();
    }

    match action.as_str() {
        "register" => {
            script.registrations += 1;
            let n = script.registrations;
            let body = script
                .register_body
                .clone()
                .unwrap_or_else(|| json!({ "plugin_id": format!("plg_{n}"), "token": format!("tok_{n}") }));
            Json(body).into_response()
        }
        "reconnect" => Json(json!({ "status": "reconnected" })).into_response(),
        "heartbeat" | "ack" => Json(json!({ "status": "ok" })).into_response(),
        "stop" => Json(json!({ "status": "stopped" })).into_response(),
        "config" => Json(json!({ "config": script.config.clone() })).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Event handler that records every dispatched event.
#[derive(Default)]
pub struct RecordingHandler {
    seen: Mutex<Vec<(EventCategory, CallbackEvent)>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler that records, then returns an error for every event.
    pub fn failing() -> Self {
        Self { seen: Mutex::new(Vec::new()), fail: true }
    }

    pub fn seen(&self) -> Vec<(EventCategory, CallbackEvent)> {
        self.seen.lock().clone()
    }

    pub fn categories(&self) -> Vec<EventCategory> {
        self.seen.lock().iter().map(|(c, _)| *c).collect()
    }
}

impl EventHandler for RecordingHandler {
    fn handle(&self, category: EventCategory, event: &CallbackEvent) -> anyhow::Result<()> {
        self.seen.lock().push((category, event.clone()));
        if self.fail {
            anyhow::bail!("handler failure for {:?}", event.event_type);
        }
        Ok(())
    }
}

/// A loopback port with nothing listening on it.
pub fn unused_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while !check() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("condition not met within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Convert any `Result<T, E: Display>` into `anyhow::Result<T>`.
pub trait AnyhowExt<T> {
    fn anyhow(self) -> anyhow::Result<T>;
}

impl<T, E: std::fmt::Display> AnyhowExt<T> for Result<T, E> {
    fn anyhow(self) -> anyhow::Result<T> {
        self.map_err(|e| anyhow::anyhow!("{e}"))
    }
}

#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}
