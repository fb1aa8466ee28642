//! Batched progress delivery.
//!
//! The extractor emits many observations per second; delivering each one
//! would overwhelm the UI. The buffer keeps the latest value per job and
//! a ticker flushes each job's value once per window. Terminal statuses
//! never pass through here (see `ManagerInner::emit_terminal`).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use downpour_core::{AppEvent, Download};

use super::ManagerInner;

/// Latest pending observation for one job.
struct Pending {
    event: AppEvent,
}

/// Per-job latest-value buffer with its own lock, so flush ticks never
/// contend with job-map lookups during dispatch.
pub(crate) struct ProgressBuffer {
    pending: Mutex<HashMap<String, Pending>>,
}

impl ProgressBuffer {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Record the latest observation for a job, replacing any unflushed one.
    pub fn update(&self, download: &Download) {
        self.pending.lock().insert(
            download.id.clone(),
            Pending {
                event: AppEvent::progress_of(download),
            },
        );
    }

    /// Drop the buffered value for a job (terminal event supersedes it).
    pub fn remove(&self, id: &str) {
        self.pending.lock().remove(id);
    }

    /// Take everything currently buffered.
    fn drain(&self) -> Vec<AppEvent> {
        self.pending
            .lock()
            .drain()
            .map(|(_, p)| p.event)
            .collect()
    }
}

/// Flush task: one emit per job per window; a final flush on shutdown.
pub(crate) async fn flush_loop(inner: Arc<ManagerInner>) {
    let mut ticker = tokio::time::interval(inner.config.flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = inner.shutdown.cancelled() => {
                for event in inner.progress.drain() {
                    inner.emitter.emit(event);
                }
                break;
            }
            _ = ticker.tick() => {
                for event in inner.progress.drain() {
                    inner.emitter.emit(event);
                }
            }
        }
    }
}
