//! Shared bot state observed by every sink worker.
//!
//! The original design kept these flags in ambient global state; here they
//! live behind one handle that the embedding bot constructs and clones into
//! the pipeline, so workers are testable in isolation with their own
//! instance.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Read-mostly process state: the "still running" signal gating all worker
/// loops and the channel online flag snapshotted into every write.
///
/// Cloning is cheap and shares the underlying flags.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    running: AtomicBool,
    online: AtomicBool,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                running: AtomicBool::new(true),
                online: AtomicBool::new(false),
            }),
        }
    }

    /// Whether the bot process is still running. Worker loops check this
    /// at each iteration boundary.
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Begin process-wide shutdown. Workers exit cooperatively; nothing is
    /// interrupted mid-write.
    pub fn request_stop(&self) {
        info!("Starting shutdown procedure");
        self.inner.running.store(false, Ordering::Release);
    }

    /// Whether the channel is currently live. Read by sinks at the moment
    /// of each write; only the online-checker mutates it.
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, reason: &str) {
        if !self.inner.online.swap(true, Ordering::AcqRel) {
            info!(reason = %reason, "Channel is online");
        }
    }

    pub fn set_offline(&self, reason: &str) {
        if self.inner.online.swap(false, Ordering::AcqRel) {
            info!(reason = %reason, "Channel is offline");
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_running_and_offline() {
        let state = SharedState::new();
        assert!(state.is_running());
        assert!(!state.is_online());
    }

    #[test]
    fn test_stop_is_visible_through_clones() {
        let state = SharedState::new();
        let observer = state.clone();
        state.request_stop();
        assert!(!observer.is_running());
    }

    #[test]
    fn test_online_transitions() {
        let state = SharedState::new();
        state.set_online("stream started");
        assert!(state.is_online());
        state.set_offline("stream ended");
        assert!(!state.is_online());
    }
}
