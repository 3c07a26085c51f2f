// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugd: plugin-host session agent for an event hub.
//!
//! Registers with the hub, keeps the session alive with heartbeats, receives
//! pushed events on a local callback listener and acknowledges them.

pub mod ack;
pub mod agent;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod hub;
pub mod listener;
pub mod registrar;
pub mod session;
pub mod test_support;

pub use agent::{run, Agent};
