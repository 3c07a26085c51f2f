// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::*;
use crate::test_support::{unused_port, FakeHub};

fn acker(base: &str) -> anyhow::Result<(Acknowledger, Arc<SessionState>)> {
    let hub = Arc::new(HubClient::connect(base, Duration::from_secs(2))?);
    let session = Arc::new(SessionState::new());
    Ok((Acknowledger::new(hub, Arc::clone(&session)), session))
}

#[tokio::test]
async fn unregistered_ack_is_skipped() -> anyhow::Result<()> {
    let fake = FakeHub::start().await?;
    let (acker, _session) = acker(&fake.url())?;

    assert_eq!(acker.ack("e1").await, AckOutcome::Skipped);
    assert!(fake.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn registered_ack_posts_token_and_event_id() -> anyhow::Result<()> {
    let fake = FakeHub::start().await?;
    let (acker, session) = acker(&fake.url())?;
    session.set("plg_7", "tok_7");

    assert_eq!(acker.ack("e1").await, AckOutcome::Sent);
    let calls = fake.calls_to("ack");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].plugin_id.as_deref(), Some("plg_7"));
    assert_eq!(calls[0].body, json!({ "token": "tok_7", "event_id": "e1" }));
    Ok(())
}

#[tokio::test]
async fn unreachable_hub_is_swallowed() -> anyhow::Result<()> {
    let (acker, session) = acker(&format!("http://127.0.0.1:{}", unused_port()?))?;
    session.set("plg_7", "tok_7");
    assert_eq!(acker.ack("e1").await, AckOutcome::Failed);
    Ok(())
}

#[tokio::test]
async fn rejected_ack_is_swallowed() -> anyhow::Result<()> {
    let fake = FakeHub::start().await?;
    fake.respond("ack", 400);
    let (acker, session) = acker(&fake.url())?;
    session.set("plg_7", "tok_7");

    assert_eq!(acker.ack("expired").await, AckOutcome::Failed);
    assert!(session.is_registered());
    Ok(())
}
