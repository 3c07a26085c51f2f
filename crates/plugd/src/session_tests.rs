// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::*;

#[test]
fn starts_unregistered() {
    let state = SessionState::new();
    assert!(!state.is_registered());
    assert_eq!(state.snapshot(), None);
    assert_eq!(state.plugin_id(), None);
}

#[test]
fn set_registers_both_fields() {
    let state = SessionState::new();
    state.set("plg_1", "tok_1");
    assert!(state.is_registered());
    assert_eq!(
        state.snapshot(),
        Some(Credentials { plugin_id: "plg_1".into(), token: "tok_1".into() })
    );
}

#[test]
fn set_overwrites_previous_pair() {
    let state = SessionState::new();
    state.set("plg_1", "tok_1");
    state.set("plg_2", "tok_2");
    let creds = state.credentials();
    assert_eq!(creds.map(|c| (c.plugin_id, c.token)), Some(("plg_2".into(), "tok_2".into())));
}

#[yare::parameterized(
    empty_id    = { "", "tok" },
    empty_token = { "plg", "" },
    both_empty  = { "", "" },
)]
fn empty_field_is_not_registered(plugin_id: &str, token: &str) {
    let state = SessionState::new();
    state.set(plugin_id, token);
    assert!(!state.is_registered());
    assert_eq!(state.credentials(), None);
}

#[test]
fn concurrent_readers_never_see_a_mixed_pair() {
    let state = Arc::new(SessionState::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let state = Arc::clone(&state);
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            for i in 0..5_000 {
                state.set(format!("plg_{i}"), format!("tok_{i}"));
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let state = Arc::clone(&state);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut mismatches = 0u32;
                while !done.load(Ordering::SeqCst) {
                    if let Some(c) = state.snapshot() {
                        let id = c.plugin_id.trim_start_matches("plg_");
                        let token = c.token.trim_start_matches("tok_");
                        if id != token {
                            mismatches += 1;
                        }
                    }
                }
                mismatches
            })
        })
        .collect();

    assert!(writer.join().is_ok());
    for reader in readers {
        assert_eq!(reader.join().ok(), Some(0));
    }
}
