// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the hub's plugin API.

use serde::{Deserialize, Serialize};

/// Event categories this agent asks the hub to deliver.
pub const CAPABILITIES: [&str; 5] = ["message", "room", "webhook", "connection", "user"];

/// Route segment shared by every plugin endpoint.
pub const PLUGINS_PATH: [&str; 2] = ["v1", "plugins"];

/// Per-plugin actions under `/v1/plugins/{id}/...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginAction {
    Reconnect,
    Heartbeat,
    Ack,
    Stop,
    Config,
}

impl PluginAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconnect => "reconnect",
            Self::Heartbeat => "heartbeat",
            Self::Ack => "ack",
            Self::Stop => "stop",
            Self::Config => "config",
        }
    }
}

/// `POST /v1/plugins/register`
#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub callback_url: &'a str,
    pub capabilities: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    #[serde(default)]
    pub plugin_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// `POST /v1/plugins/{id}/reconnect`
#[derive(Debug, Serialize)]
pub struct ReconnectRequest<'a> {
    pub token: &'a str,
    pub callback_url: &'a str,
    pub capabilities: &'a [&'a str],
}

/// Body of heartbeat and stop notifications.
#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub token: &'a str,
}

/// `POST /v1/plugins/{id}/ack`
#[derive(Debug, Serialize)]
pub struct AckRequest<'a> {
    pub token: &'a str,
    pub event_id: &'a str,
}

/// `GET /v1/plugins/{id}/config`
#[derive(Debug, Deserialize)]
pub struct ConfigResponse {
    #[serde(default)]
    pub config: serde_json::Value,
}
