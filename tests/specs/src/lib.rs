// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `plugd` binary as a subprocess against an in-process
//! fake hub and drives it over HTTP and signals.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

pub use plugd::test_support::FakeHub;

/// Resolve the path to the compiled `plugd` binary.
pub fn plugd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("plugd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `plugd` process that is killed on drop.
pub struct PlugdProcess {
    child: Child,
    port: u16,
}

impl PlugdProcess {
    /// Spawn plugd registering with `hub_url`, with fast timers.
    pub fn start(hub_url: &str) -> anyhow::Result<Self> {
        Self::spawn(hub_url, &[])
    }

    /// Spawn plugd with extra CLI arguments appended.
    pub fn spawn(hub_url: &str, extra: &[&str]) -> anyhow::Result<Self> {
        plugd::hub::ensure_crypto();
        let binary = plugd_binary();
        anyhow::ensure!(binary.exists(), "plugd binary not found at {}", binary.display());

        let port = free_port()?;
        let mut args: Vec<String> = vec![
            "--hub-url".into(),
            hub_url.into(),
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--name".into(),
            "smoke-plugin".into(),
            "--log-format".into(),
            "text".into(),
            "--log-level".into(),
            "warn".into(),
        ];
        args.extend(extra.iter().map(|s| s.to_string()));

        let child = Command::new(&binary)
            .args(&args)
            .env("PLUGD_HEARTBEAT_MS", "100")
            .env("PLUGD_REGISTER_RETRY_MS", "50")
            .env("PLUGD_SHUTDOWN_TIMEOUT_MS", "2000")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port })
    }

    /// Preferred callback port passed on the command line.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll `/health` until the agent reports itself registered.
    pub async fn wait_registered(&self, timeout: Duration) -> anyhow::Result<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + timeout;
        let client = reqwest::Client::builder().build()?;
        let url = format!("{}/health", self.base_url());
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("plugd did not register within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    if body["registered"] == true {
                        return Ok(body);
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Deliver SIGTERM.
    pub fn terminate(&self) -> anyhow::Result<()> {
        let pid = Pid::from_raw(i32::try_from(self.child.id())?);
        kill(pid, Signal::SIGTERM)?;
        Ok(())
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("plugd did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for PlugdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
