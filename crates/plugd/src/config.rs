// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use clap::Parser;

/// Plugin-host session agent for an event hub.
#[derive(Debug, Clone, Parser)]
#[command(name = "plugd", version, about)]
pub struct Config {
    /// Host address the callback listener binds to.
    #[arg(long, env = "PLUGD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Preferred callback listener port (falls back to an ephemeral port).
    #[arg(long, env = "PLUGD_PORT", default_value_t = 18090)]
    pub port: u16,

    /// Host advertised to the hub in the callback URL. Defaults to --host.
    #[arg(long, env = "PLUGD_CALLBACK_HOST")]
    pub callback_host: Option<String>,

    /// Base URL of the event hub.
    #[arg(long, env = "PLUGD_HUB_URL", default_value = "http://127.0.0.1:8080")]
    pub hub_url: String,

    /// Plugin name sent on registration.
    #[arg(long, env = "PLUGD_NAME", default_value = "example")]
    pub name: String,

    /// Registration attempts at startup before giving up.
    #[arg(long, env = "PLUGD_REGISTER_ATTEMPTS", default_value_t = 10)]
    pub register_attempts: u32,

    /// Log format (json or text).
    #[arg(long, env = "PLUGD_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "PLUGD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    // -- Duration overrides (skip from CLI; set in Config::test()) --------
    #[clap(skip)]
    pub heartbeat_ms: Option<u64>,
    #[clap(skip)]
    pub register_retry_ms: Option<u64>,
    #[clap(skip)]
    pub request_timeout_ms: Option<u64>,
    #[clap(skip)]
    pub shutdown_timeout_ms: Option<u64>,
}

fn env_duration_ms(var: &str, default: u64) -> Duration {
    let ms = std::env::var(var).ok().and_then(|v| v.parse().ok()).unwrap_or(default);
    Duration::from_millis(ms)
}

macro_rules! duration_field {
    ($method:ident, $field:ident, $env:literal, $default:expr) => {
        pub fn $method(&self) -> Duration {
            match self.$field {
                Some(ms) => Duration::from_millis(ms),
                None => env_duration_ms($env, $default),
            }
        }
    };
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = reqwest::Url::parse(&self.hub_url)
            .map_err(|e| anyhow::anyhow!("invalid --hub-url {:?}: {e}", self.hub_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("--hub-url must be http or https, got {}", url.scheme());
        }
        if url.cannot_be_a_base() {
            anyhow::bail!("--hub-url cannot be used as a base URL");
        }

        if self.name.trim().is_empty() {
            anyhow::bail!("--name must not be empty");
        }
        if self.register_attempts == 0 {
            anyhow::bail!("--register-attempts must be at least 1");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("invalid log format: {} (expected json or text)", self.log_format);
        }
        Ok(())
    }

    // -- Tuning knobs (field override → env var → compiled default) --------

    duration_field!(heartbeat_interval, heartbeat_ms, "PLUGD_HEARTBEAT_MS", 5_000);
    duration_field!(register_retry_delay, register_retry_ms, "PLUGD_REGISTER_RETRY_MS", 3_000);
    duration_field!(request_timeout, request_timeout_ms, "PLUGD_REQUEST_TIMEOUT_MS", 5_000);
    duration_field!(shutdown_timeout, shutdown_timeout_ms, "PLUGD_SHUTDOWN_TIMEOUT_MS", 5_000);

    /// Host the hub should use to reach the callback listener.
    ///
    /// Wildcard bind addresses are not routable, so they advertise loopback.
    pub fn advertised_host(&self) -> &str {
        if let Some(ref host) = self.callback_host {
            return host;
        }
        match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            host => host,
        }
    }

    /// Build a minimal `Config` for tests (ephemeral port, fast timers).
    #[doc(hidden)]
    pub fn test(hub_url: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            callback_host: None,
            hub_url: hub_url.into(),
            name: "test-plugin".into(),
            register_attempts: 3,
            log_format: "text".into(),
            log_level: "debug".into(),
            heartbeat_ms: Some(50),
            register_retry_ms: Some(20),
            request_timeout_ms: Some(1_000),
            shutdown_timeout_ms: Some(500),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
