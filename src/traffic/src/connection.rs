//! Shared stop/close primitive for clients, servers and tasks.
//!
//! Mirrors `lydian.traffic.connection.Connection`: a stop-event that starts
//! *set* (stopped) and must be cleared before a socket loop will run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cap on concurrent connections a single server will track (`MAX_CONNS`).
pub const MAX_CONNS: usize = 20;

/// A clearable, idempotent stop signal that a blocking socket loop polls.
///
/// Unlike a raw `CancellationToken`, a `StopEvent` can be reset, matching the
/// Python `Connection`'s `clear_event()`/`set_event()` pair used by
/// `ClientManager`/`ServerManager` to restart a task without discarding it.
#[derive(Clone)]
pub struct StopEvent {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopEvent {
    /// Starts in the stopped state, matching the original's default-set event.
    pub fn new() -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn set(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once `set()` is called, for tasks blocked on async I/O.
    pub async fn wait(&self) {
        if self.is_set() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for StopEvent {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_stopped() {
        let event = StopEvent::new();
        assert!(event.is_set());
        event.clear();
        assert!(!event.is_set());
        event.set();
        assert!(event.is_set());
    }

    #[tokio::test]
    async fn wait_resolves_immediately_if_already_set() {
        let event = StopEvent::new();
        tokio::time::timeout(std::time::Duration::from_millis(50), event.wait())
            .await
            .expect("wait should not block when already stopped");
    }
}
