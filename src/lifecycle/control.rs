//! Control events for the supervisor.

use tokio::sync::broadcast;

/// An event the supervisor reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Forward SIGTERM to workers, wait for them, then return.
    Shutdown,
    /// Forward SIGHUP to workers.
    Reload,
}

/// Coordinator for control events.
///
/// Provides a broadcast channel that long-running tasks can subscribe to.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    /// Broadcast channel sender.
    tx: broadcast::Sender<Control>,
}

impl ControlHandle {
    /// Create a new control coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to control events.
    pub fn subscribe(&self) -> broadcast::Receiver<Control> {
        self.tx.subscribe()
    }

    /// Publish a control event. Events sent with no subscriber are dropped.
    pub fn trigger(&self, event: Control) {
        let _ = self.tx.send(event);
    }
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}
