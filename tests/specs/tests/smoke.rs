// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `plugd` binary against a
//! fake hub: registration, heartbeats, event delivery and shutdown.

use std::time::Duration;

use serde_json::json;

use plugd_specs::{FakeHub, PlugdProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn registers_and_heartbeats() -> anyhow::Result<()> {
    let hub = FakeHub::start().await?;
    let plugd = PlugdProcess::start(&hub.url())?;

    let health = plugd.wait_registered(TIMEOUT).await?;
    assert_eq!(health["status"], "running");
    assert_eq!(health["plugin_id"], "plg_1");

    let registrations = hub.calls_to("register");
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].body["name"], "smoke-plugin");
    assert_eq!(
        registrations[0].body["callback_url"],
        format!("http://127.0.0.1:{}/callback", plugd.port())
    );

    let beats = hub.wait_for("heartbeat", 2, TIMEOUT).await?;
    assert!(beats.iter().all(|c| c.body == json!({ "token": "tok_1" })));
    Ok(())
}

#[tokio::test]
async fn pushed_event_is_answered_then_acked() -> anyhow::Result<()> {
    let hub = FakeHub::start().await?;
    let plugd = PlugdProcess::start(&hub.url())?;
    plugd.wait_registered(TIMEOUT).await?;

    let client = reqwest::Client::builder().build()?;
    let resp = client
        .post(format!("{}/callback", plugd.base_url()))
        .header("X-VIM-Plugin-ID", "plg_1")
        .header("X-VIM-Plugin-Token", "tok_1")
        .json(&json!({ "event_type": "message.sent", "event_id": "e1", "content": "hi" }))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.json::<serde_json::Value>().await?, json!({ "status": "ok" }));

    let acks = hub.wait_for("ack", 1, TIMEOUT).await?;
    assert_eq!(acks[0].body, json!({ "token": "tok_1", "event_id": "e1" }));

    let resp = client.post(format!("{}/callback", plugd.base_url())).body("not json").send().await?;
    assert_eq!(resp.status().as_u16(), 200);
    Ok(())
}

#[tokio::test]
async fn sigterm_sends_one_stop_and_exits_cleanly() -> anyhow::Result<()> {
    let hub = FakeHub::start().await?;
    let mut plugd = PlugdProcess::start(&hub.url())?;
    plugd.wait_registered(TIMEOUT).await?;

    plugd.terminate()?;
    let status = plugd.wait_exit(TIMEOUT).await?;
    assert!(status.success(), "exit: {status:?}");

    let stops = hub.calls_to("stop");
    assert_eq!(stops.len(), 1);
    assert_eq!(stops[0].plugin_id.as_deref(), Some("plg_1"));
    assert_eq!(stops[0].body, json!({ "token": "tok_1" }));
    Ok(())
}

#[tokio::test]
async fn rejected_registration_exits_with_failure() -> anyhow::Result<()> {
    let hub = FakeHub::start().await?;
    hub.respond("register", 403);
    let mut plugd = PlugdProcess::start(&hub.url())?;

    let status = plugd.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(1));
    assert_eq!(hub.calls_to("register").len(), 1);
    assert!(hub.calls_to("stop").is_empty());
    Ok(())
}

#[tokio::test]
async fn invalid_configuration_exits_with_status_2() -> anyhow::Result<()> {
    let hub = FakeHub::start().await?;
    let mut plugd = PlugdProcess::spawn(&hub.url(), &["--register-attempts", "0"])?;

    let status = plugd.wait_exit(TIMEOUT).await?;
    assert_eq!(status.code(), Some(2));
    assert!(hub.calls().is_empty());
    Ok(())
}
