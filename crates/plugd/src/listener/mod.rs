// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local callback listener the hub pushes events to.
//!
//! Every push is answered `200 {"status":"ok"}`, whatever the body holds and
//! whatever the handler does with it. The acknowledgment for an event is
//! released only once that response body has been handed to the connection.

pub mod dispatch;
pub mod event;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::ack::Acknowledger;
use crate::error::BindError;
use crate::session::SessionState;
use dispatch::{dispatch, EventHandler};
use event::CallbackEvent;

pub const CALLBACK_PATH: &str = "/callback";
pub const HEALTH_PATH: &str = "/health";

/// Headers the hub attaches to every push.
pub const PLUGIN_ID_HEADER: &str = "x-vim-plugin-id";
pub const PLUGIN_TOKEN_HEADER: &str = "x-vim-plugin-token";

/// Bodies beyond this are treated as empty events rather than rejected.
const MAX_EVENT_BYTES: usize = 16 * 1024 * 1024;

const OK_BODY: &[u8] = br#"{"status":"ok"}"#;

/// A bound (not yet serving) callback listener.
#[derive(Debug)]
pub struct BoundListener {
    pub listener: TcpListener,
    pub addr: SocketAddr,
    /// True when the preferred port was unavailable.
    pub fell_back: bool,
}

impl BoundListener {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

/// Bind `host:preferred`, falling back to an OS-assigned port.
pub async fn bind(host: &str, preferred: u16) -> Result<BoundListener, BindError> {
    let bind_error = |source| BindError { host: host.to_owned(), preferred, source };

    let (listener, fell_back) = match TcpListener::bind((host, preferred)).await {
        Ok(listener) => (listener, false),
        Err(e) => {
            warn!(host, port = preferred, err = %e, "preferred port unavailable, using an ephemeral port");
            (TcpListener::bind((host, 0)).await.map_err(bind_error)?, true)
        }
    };
    let addr = listener.local_addr().map_err(bind_error)?;
    info!(%addr, fell_back, "callback listener bound");
    Ok(BoundListener { listener, addr, fell_back })
}

/// URL the hub should post events to.
pub fn callback_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}{CALLBACK_PATH}")
    } else {
        format!("http://{host}:{port}{CALLBACK_PATH}")
    }
}

/// Shared state for the listener's handlers.
pub struct ListenerState {
    pub session: Arc<SessionState>,
    pub handler: Arc<dyn EventHandler>,
    pub acker: Acknowledger,
    /// In-flight acknowledgment tasks, drained on shutdown.
    pub tasks: TaskTracker,
}

/// Build the axum `Router` for the callback listener.
pub fn build_router(state: Arc<ListenerState>) -> Router {
    Router::new()
        .route(CALLBACK_PATH, post(callback))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown`, letting in-flight requests finish.
pub fn serve(bound: BoundListener, router: Router, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = axum::serve(bound.listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await;
        if let Err(e) = result {
            error!("callback listener error: {e}");
        }
    })
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub registered: bool,
    pub plugin_id: Option<String>,
}

/// `GET /health`
async fn health(State(s): State<Arc<ListenerState>>) -> impl IntoResponse {
    let plugin_id = s.session.plugin_id();
    Json(HealthResponse { status: "running", registered: plugin_id.is_some(), plugin_id })
}

/// `POST /callback`: one pushed event.
async fn callback(State(s): State<Arc<ListenerState>>, headers: HeaderMap, body: Body) -> Response {
    check_sender(&s.session, &headers);

    let bytes = match axum::body::to_bytes(body, MAX_EVENT_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(err = %e, "failed to read event body, using empty payload");
            Bytes::new()
        }
    };
    let event = CallbackEvent::decode(&bytes);
    let outcome = dispatch(s.handler.as_ref(), &event);
    debug!(event_type = ?event.event_type, event_id = ?event.event_id, ?outcome, "event received");

    let released = event.event_id.map(|event_id| schedule_ack(&s, event_id));
    ok_response(released)
}

/// Warn when a push claims to be for another plugin. Never rejects.
fn check_sender(session: &SessionState, headers: &HeaderMap) {
    let Some(creds) = session.credentials() else {
        return;
    };
    let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok());
    if let Some(claimed) = header_str(PLUGIN_ID_HEADER) {
        if claimed != creds.plugin_id {
            warn!(claimed, plugin_id = %creds.plugin_id, "push addressed to another plugin id");
        }
    }
    if header_str(PLUGIN_TOKEN_HEADER).is_some_and(|t| t != creds.token) {
        warn!(plugin_id = %creds.plugin_id, "push carries a stale plugin token");
    }
}

/// Spawn the ack for `event_id`, gated on the returned sender.
fn schedule_ack(s: &ListenerState, event_id: String) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    let acker = s.acker.clone();
    s.tasks.spawn(async move {
        // A dropped sender also means the response is gone.
        let _ = rx.await;
        acker.ack(&event_id).await;
    });
    tx
}

/// Fires its sender when dropped, i.e. when the response body is released.
struct Released(Option<oneshot::Sender<()>>);

impl Drop for Released {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

fn ok_response(released: Option<oneshot::Sender<()>>) -> Response {
    let guard = Released(released);
    let chunks = futures_util::stream::iter([Ok::<_, Infallible>(Bytes::from_static(OK_BODY))])
        .map(move |chunk| {
            let _held = &guard;
            chunk
        });
    let mut response = Body::from_stream(chunks).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(OK_BODY.len()));
    response
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
