//! Event emitter trait for publishing to the GUI shell.
//!
//! The bus itself is provided by the shell; the core only publishes.
//! Implementations handle transport details (Tauri/Wails events, channels).

use crate::events::AppEvent;

/// Trait for emitting application events.
///
/// Emission is best-effort and must not block: the download manager calls
/// this from hot paths. Losing an intermediate progress event is tolerable;
/// the core guarantees it *emits* every terminal event, delivery below the
/// bus is the shell's concern.
pub trait EventEmitter: Send + Sync {
    /// Emit an application event.
    fn emit(&self, event: AppEvent);

    /// Clone this emitter into a boxed trait object.
    ///
    /// This enables cloning of `Arc<dyn EventEmitter>` without requiring
    /// the underlying type to implement Clone.
    fn clone_box(&self) -> Box<dyn EventEmitter>;
}

/// A no-op event emitter for tests and headless contexts.
#[derive(Debug, Clone, Default)]
pub struct NoopEmitter;

impl NoopEmitter {
    /// Create a new no-op emitter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventEmitter for NoopEmitter {
    fn emit(&self, _event: AppEvent) {
        // Intentionally do nothing
    }

    fn clone_box(&self) -> Box<dyn EventEmitter> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn noop_emitter_discards() {
        let emitter: Arc<dyn EventEmitter> = Arc::new(NoopEmitter::new());
        emitter.emit(AppEvent::LauncherComplete);
        let _boxed: Box<dyn EventEmitter> = emitter.clone_box();
    }
}
