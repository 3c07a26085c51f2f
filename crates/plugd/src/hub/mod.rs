// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the event hub's plugin API.
//!
//! One request, one response, fixed timeout. Retry policy belongs to callers.

pub mod protocol;

use std::sync::Once;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::HubError;
use protocol::{PluginAction, PLUGINS_PATH};

/// Longest slice of a rejection body kept in [`HubError::Status`].
const MAX_ERROR_BODY: usize = 256;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Thin wrapper over `reqwest::Client` bound to one hub base URL.
#[derive(Debug, Clone)]
pub struct HubClient {
    base_url: Url,
    client: Client,
}

impl HubClient {
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        ensure_crypto();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { base_url, client }
    }

    /// Parse `base_url` and build a client for it.
    pub fn connect(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)?;
        anyhow::ensure!(!url.cannot_be_a_base(), "hub URL cannot be a base: {base_url}");
        Ok(Self::new(url, timeout))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append path segments to the base URL (each segment is percent-encoded).
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `/v1/plugins/register`
    pub fn register_url(&self) -> Url {
        self.endpoint(&[PLUGINS_PATH[0], PLUGINS_PATH[1], "register"])
    }

    /// `/v1/plugins/{plugin_id}/{action}`
    pub fn plugin_url(&self, plugin_id: &str, action: PluginAction) -> Url {
        self.endpoint(&[PLUGINS_PATH[0], PLUGINS_PATH[1], plugin_id, action.as_str()])
    }

    /// POST a JSON body and decode the JSON response (empty body → empty object).
    pub async fn post<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<Value, HubError> {
        let resp = self.client.post(url).json(body).send().await.map_err(HubError::Network)?;
        read_json(resp).await
    }

    /// GET with query parameters and decode the JSON response.
    pub async fn get(&self, mut url: Url, query: &[(&str, &str)]) -> Result<Value, HubError> {
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let resp = self.client.get(url).send().await.map_err(HubError::Network)?;
        read_json(resp).await
    }
}

async fn read_json(resp: Response) -> Result<Value, HubError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(HubError::Status { code: status.as_u16(), body: truncate(body) });
    }

    let bytes = resp.bytes().await.map_err(HubError::Network)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| HubError::Protocol(format!("response is not valid JSON: {e}")))
}

fn truncate(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
