// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Background janitor sweep.
//!
//! Periodically evicts expired, non-penalized entries to bound memory.
//! Eligibility lives in [`WindowCounterStore::sweep`]; this module only
//! schedules it. The task tolerates concurrent request-path mutation
//! (the store's `retain` takes shards one at a time) and is cancelled
//! through the returned handle.

use crate::store::{now_ms, WindowCounterStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Periodic sweep over a shared store.
pub struct Janitor {
    store: Arc<WindowCounterStore>,
    interval: Duration,
}

/// Handle to a running janitor task.
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the sweep task.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Janitor {
    pub fn new(store: Arc<WindowCounterStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Spawn the sweep loop onto the current runtime.
    pub fn spawn(self) -> JanitorHandle {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let evicted = self.store.sweep(now_ms());
                if evicted > 0 {
                    debug!(evicted, tracked = self.store.tracked_keys(), "janitor sweep");
                }
            }
        });
        JanitorHandle { task }
    }
}
