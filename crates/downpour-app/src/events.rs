//! Event fan-out to the GUI shell.

use tokio::sync::broadcast;

use downpour_core::{AppEvent, EventEmitter};

/// Broadcast-channel emitter the shell adapter subscribes to.
///
/// Emission never blocks: with no subscriber (headless runs, early
/// startup) events are simply dropped, which matches the best-effort
/// bus contract.
#[derive(Clone)]
pub struct BroadcastEmitter {
    tx: broadcast::Sender<AppEvent>,
}

impl BroadcastEmitter {
    /// Create an emitter with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventEmitter for BroadcastEmitter {
    fn emit(&self, event: AppEvent) {
        // Err means no subscribers; the bus is best-effort.
        let _ = self.tx.send(event);
    }

    fn clone_box(&self) -> Box<dyn EventEmitter> {
        Box::new(self.clone())
    }
}
