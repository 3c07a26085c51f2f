// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Category routing for inbound events.
//!
//! Dispatch is synchronous and happens before the listener responds. Events
//! whose namespace is unknown are accepted without dispatch: the hub may add
//! categories this agent has never heard of.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::event::{namespace_of, CallbackEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Room,
    Connection,
    User,
    Message,
    Webhook,
    Control,
}

impl EventCategory {
    pub const ALL: [Self; 6] =
        [Self::Room, Self::Connection, Self::User, Self::Message, Self::Webhook, Self::Control];

    /// Route a dotted event type by its namespace. Case-sensitive; a type
    /// without a dot (`"room"`) has no namespace and is not routed.
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match namespace_of(event_type)? {
            "room" => Some(Self::Room),
            "connection" => Some(Self::Connection),
            "user" => Some(Self::User),
            "message" => Some(Self::Message),
            "webhook" => Some(Self::Webhook),
            "control" => Some(Self::Control),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Connection => "connection",
            Self::User => "user",
            Self::Message => "message",
            Self::Webhook => "webhook",
            Self::Control => "control",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business logic reacting to routed events.
pub trait EventHandler: Send + Sync {
    fn handle(&self, category: EventCategory, event: &CallbackEvent) -> anyhow::Result<()>;
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled(EventCategory),
    /// No type, or a namespace with no handler path.
    Unrouted,
    /// The handler returned an error (logged, never surfaced to the hub).
    Failed(EventCategory),
}

pub fn dispatch(handler: &dyn EventHandler, event: &CallbackEvent) -> Dispatch {
    let Some(category) = event.event_type.as_deref().and_then(EventCategory::from_event_type)
    else {
        debug!(event_type = ?event.event_type, "no handler for event, accepting");
        return Dispatch::Unrouted;
    };
    match handler.handle(category, event) {
        Ok(()) => Dispatch::Handled(category),
        Err(e) => {
            warn!(%category, event_type = ?event.event_type, err = %e, "event handler failed");
            Dispatch::Failed(category)
        }
    }
}

/// Latest plugin configuration issued by the hub.
#[derive(Debug, Default)]
pub struct ConfigSlot {
    inner: RwLock<Option<Value>>,
}

impl ConfigSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Value> {
        self.inner.read().clone()
    }

    pub fn set(&self, config: Value) {
        *self.inner.write() = Some(config);
    }
}

/// Default handler: logs every category and tracks hub-pushed configuration.
pub struct LogHandler {
    config: Arc<ConfigSlot>,
}

impl LogHandler {
    pub fn new(config: Arc<ConfigSlot>) -> Self {
        Self { config }
    }

    fn on_control(&self, event: &CallbackEvent) -> anyhow::Result<()> {
        match event.action() {
            Some("config_update") => {
                let Some(config) = event.payload.get("config") else {
                    anyhow::bail!("config_update without config");
                };
                self.config.set(config.clone());
                info!("plugin configuration updated by hub");
            }
            Some("stop") => info!("hub is stopping"),
            other => debug!(action = ?other, "control event"),
        }
        Ok(())
    }
}

impl EventHandler for LogHandler {
    fn handle(&self, category: EventCategory, event: &CallbackEvent) -> anyhow::Result<()> {
        let event_type = event.event_type.as_deref().unwrap_or_default();
        let event_id = event.event_id.as_deref().unwrap_or("-");
        match category {
            EventCategory::Message => {
                let direction = event.payload.get("direction").and_then(Value::as_str);
                let client = event.payload.get("client_id").and_then(Value::as_str);
                info!(event_type, event_id, direction, client, "message event");
            }
            EventCategory::Room => info!(event_type, event_id, "room event"),
            EventCategory::Connection => info!(event_type, event_id, "connection event"),
            EventCategory::User => info!(event_type, event_id, "user event"),
            EventCategory::Webhook => info!(event_type, event_id, "webhook event"),
            EventCategory::Control => return self.on_control(event),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
