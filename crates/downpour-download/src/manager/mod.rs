//! Download manager implementation.
//!
//! # Architecture
//!
//! - **`AddJob`**: validates-by-contract input, dedups per active URL,
//!   persists, registers the job, publishes to the intake channel
//! - **Dispatch loop**: single task reading intake, acquiring a semaphore
//!   slot (the backpressure point), handing jobs to workers
//! - **Worker**: probe → persist metadata → stream download → finalize
//! - **Progress buffer**: per-job latest value, flushed on a ~50 ms tick;
//!   terminal statuses bypass the buffer
//!
//! # Concurrency Model
//!
//! - Every job runs on a child token of the manager's shutdown token
//! - The job map uses a reader-writer lock (reads dominate); the pending
//!   progress map has its own lock to keep flush ticks off the map
//! - Exactly-one-terminal-event: finalization removes the job from the
//!   map first, and only the remover emits

mod progress;
mod worker;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use downpour_core::{
    AppEvent, CoreError, CoreResult, Download, DownloadOptions, DownloadRepository, DownloadStatus,
    ErrorKind, EventEmitter, Extractor,
};

use progress::ProgressBuffer;

/// Intake channel capacity. `AddJob` never waits; a full channel is a
/// precondition failure.
const INTAKE_CAPACITY: usize = 100;

/// Configuration for the download manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Maximum simultaneous workers. Minimum 1.
    pub max_concurrent: usize,
    /// Directory downloads are written to.
    pub output_dir: PathBuf,
    /// Cadence of the batched progress flush.
    pub flush_interval: Duration,
    /// Cadence of the observability log line.
    pub metrics_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            output_dir: PathBuf::from("."),
            flush_interval: Duration::from_millis(50),
            metrics_interval: Duration::from_secs(60),
        }
    }
}

/// In-memory companion of a queued/running download.
pub(crate) struct Job {
    pub download: Download,
    pub options: DownloadOptions,
    pub cancel: CancellationToken,
}

/// Map entry for an active job.
struct ActiveJob {
    cancel: CancellationToken,
    incognito: bool,
}

pub(crate) struct ManagerInner {
    pub repo: Arc<dyn DownloadRepository>,
    pub extractor: Arc<dyn Extractor>,
    pub emitter: Arc<dyn EventEmitter>,
    pub config: ManagerConfig,
    intake_tx: mpsc::Sender<Job>,
    intake_rx: Mutex<Option<mpsc::Receiver<Job>>>,
    semaphore: Arc<Semaphore>,
    jobs: RwLock<HashMap<String, ActiveJob>>,
    pub progress: ProgressBuffer,
    pub shutdown: CancellationToken,
    tracker: TaskTracker,
    pub completed_total: AtomicU64,
    pub failed_total: AtomicU64,
    started: AtomicBool,
}

impl ManagerInner {
    /// Remove a job from the map; the caller that gets `Some` owns
    /// finalization (store write + terminal event).
    pub async fn take_job(&self, id: &str) -> Option<(CancellationToken, bool)> {
        self.jobs
            .write()
            .await
            .remove(id)
            .map(|j| (j.cancel, j.incognito))
    }

    /// Emit a terminal progress event immediately, dropping any buffered
    /// intermediate value for the job.
    pub fn emit_terminal(&self, download: &Download) {
        self.progress.remove(&download.id);
        self.emitter.emit(AppEvent::progress_of(download));
    }
}

/// The bounded-concurrency download manager.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<ManagerInner>,
}

impl DownloadManager {
    /// Create a manager. Call [`DownloadManager::start`] before queueing.
    #[must_use]
    pub fn new(
        repo: Arc<dyn DownloadRepository>,
        extractor: Arc<dyn Extractor>,
        emitter: Arc<dyn EventEmitter>,
        config: ManagerConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        let (intake_tx, intake_rx) = mpsc::channel(INTAKE_CAPACITY);

        Self {
            inner: Arc::new(ManagerInner {
                repo,
                extractor,
                emitter,
                config: ManagerConfig {
                    max_concurrent,
                    ..config
                },
                intake_tx,
                intake_rx: Mutex::new(Some(intake_rx)),
                semaphore: Arc::new(Semaphore::new(max_concurrent)),
                jobs: RwLock::new(HashMap::new()),
                progress: ProgressBuffer::new(),
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                completed_total: AtomicU64::new(0),
                failed_total: AtomicU64::new(0),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Start the manager: restore pending jobs, then spawn the dispatch,
    /// metrics, and progress-flush tasks. Idempotent.
    pub async fn start(&self) -> CoreResult<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let restored = self.restore_pending().await?;
        if restored > 0 {
            tracing::info!(target: "downpour.download", restored, "restored pending downloads");
        }

        let rx = self
            .inner
            .intake_rx
            .lock()
            .await
            .take()
            .expect("intake receiver taken once");

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(dispatch_loop(inner, rx));

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(progress::flush_loop(inner));

        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(metrics_loop(inner));

        Ok(())
    }

    /// Queue a download.
    ///
    /// Idempotent per active URL: if a non-terminal row for the URL
    /// exists, that row is returned and no event is emitted.
    pub async fn add_job(&self, options: DownloadOptions) -> CoreResult<Download> {
        const OP: &str = "DownloadManager.AddJob";

        if let Some(existing) = self.inner.repo.exists_active_by_url(&options.url).await? {
            return Ok(existing);
        }

        let download = Download::from_options(&options);
        let created = match self.inner.repo.create(&download).await {
            Ok(created) => created,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Lost the insert race; the winner's row is the job.
                return self
                    .inner
                    .repo
                    .exists_active_by_url(&options.url)
                    .await?
                    .ok_or_else(|| CoreError::wrap(OP, e));
            }
            Err(e) => return Err(CoreError::wrap(OP, e)),
        };

        let cancel = self.inner.shutdown.child_token();
        self.inner.jobs.write().await.insert(
            created.id.clone(),
            ActiveJob {
                cancel: cancel.clone(),
                incognito: options.incognito,
            },
        );

        self.inner.emitter.emit(AppEvent::DownloadAdded {
            download: created.clone(),
        });
        // Caller-supplied metadata gets an immediate 0% frame so the UI
        // renders the tile without waiting for the probe.
        if options.title.is_some() || options.thumbnail.is_some() {
            self.inner.emitter.emit(AppEvent::progress_of(&created));
        }

        self.publish(Job {
            download: created.clone(),
            options,
            cancel,
        })
        .await?;

        Ok(created)
    }

    /// Cancel a job.
    ///
    /// Idempotent: cancelling a terminal or already-cancelled job is a
    /// no-op on the store. Unknown ids are `NotFound`.
    pub async fn cancel_job(&self, id: &str) -> CoreResult<()> {
        const OP: &str = "DownloadManager.CancelJob";

        if let Some((cancel, incognito)) = self.inner.take_job(id).await {
            cancel.cancel();

            let mut download = match self.inner.repo.get_by_id(id).await {
                Ok(d) => d,
                Err(e) if e.kind() == ErrorKind::NotFound => Download::from_options(
                    &DownloadOptions::default(),
                ),
                Err(e) => return Err(CoreError::wrap(OP, e)),
            };
            download.id = id.to_string();
            download.status = DownloadStatus::Cancelled;
            download.completed_at = Some(chrono::Utc::now());

            if incognito {
                self.inner.repo.delete(id).await?;
            } else if let Err(e) = self.inner.repo.update_status(id, DownloadStatus::Cancelled).await
            {
                if e.kind() != ErrorKind::NotFound {
                    return Err(CoreError::wrap(OP, e));
                }
            }

            self.inner.emit_terminal(&download);
            tracing::info!(target: "downpour.download", id, "download cancelled");
            return Ok(());
        }

        // Not active: a cancel after terminal state is a no-op.
        let row = self.inner.repo.get_by_id(id).await?;
        if !row.status.is_terminal() {
            self.inner
                .repo
                .update_status(id, DownloadStatus::Cancelled)
                .await?;
            let mut cancelled = row;
            cancelled.status = DownloadStatus::Cancelled;
            cancelled.completed_at = Some(chrono::Utc::now());
            self.inner.emit_terminal(&cancelled);
        }
        Ok(())
    }

    /// All non-terminal rows, oldest first.
    pub async fn queue(&self) -> CoreResult<Vec<Download>> {
        self.inner.repo.get_queue().await
    }

    /// Terminal rows, newest first.
    pub async fn history(&self, limit: u32) -> CoreResult<Vec<Download>> {
        self.inner.repo.get_history(limit).await
    }

    /// Delete all terminal rows.
    pub async fn clear_history(&self) -> CoreResult<u64> {
        self.inner.repo.clear_history().await
    }

    /// Number of jobs currently registered (queued or running).
    pub async fn active_count(&self) -> usize {
        self.inner.jobs.read().await.len()
    }

    /// Stop the manager: signal shutdown, wait for workers to return,
    /// flush remaining buffered progress exactly once.
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Re-register rows left in `pending`/`downloading` by a previous run.
    ///
    /// Only the persisted field subset is available, so advanced options
    /// (accelerator, cookies, incognito, trim) fall back to defaults.
    /// Jobs keep their original id and `created_at`.
    async fn restore_pending(&self) -> CoreResult<usize> {
        let pending = self.inner.repo.get_pending().await?;
        let count = pending.len();

        // Register everything before publishing so an AddJob racing the
        // restore still deduplicates against these ids.
        {
            let mut jobs = self.inner.jobs.write().await;
            for row in &pending {
                jobs.insert(
                    row.id.clone(),
                    ActiveJob {
                        cancel: self.inner.shutdown.child_token(),
                        incognito: false,
                    },
                );
            }
        }

        for row in pending {
            let cancel = {
                let jobs = self.inner.jobs.read().await;
                jobs.get(&row.id).map(|j| j.cancel.clone())
            };
            let Some(cancel) = cancel else { continue };

            let options = DownloadOptions {
                url: row.url.clone(),
                format: (!row.format.is_empty()).then(|| row.format.clone()),
                audio_only: row.audio_only,
                title: (!row.title.is_empty()).then(|| row.title.clone()),
                thumbnail: (!row.thumbnail.is_empty()).then(|| row.thumbnail.clone()),
                ..DownloadOptions::default()
            };
            self.publish(Job {
                download: row,
                options,
                cancel,
            })
            .await?;
        }

        Ok(count)
    }

    async fn publish(&self, job: Job) -> CoreResult<()> {
        let id = job.download.id.clone();
        if let Err(e) = self.inner.intake_tx.try_send(job) {
            self.inner.jobs.write().await.remove(&id);
            return Err(CoreError::internal(
                "DownloadManager.AddJob",
                format!("intake queue full: {e}"),
            ));
        }
        Ok(())
    }
}

/// Single reader of the intake channel.
///
/// Acquiring the semaphore slot here is the backpressure point: `AddJob`
/// never waits, dispatch does.
async fn dispatch_loop(inner: Arc<ManagerInner>, mut rx: mpsc::Receiver<Job>) {
    loop {
        let job = tokio::select! {
            () = inner.shutdown.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let permit = tokio::select! {
            () = inner.shutdown.cancelled() => break,
            permit = Arc::clone(&inner.semaphore).acquire_owned() => {
                permit.expect("semaphore never closed")
            }
        };

        let worker_inner = Arc::clone(&inner);
        inner.tracker.spawn(async move {
            worker::run(worker_inner, job).await;
            drop(permit);
        });
    }
}

/// Observability only: a heartbeat line with queue/worker counters.
async fn metrics_loop(inner: Arc<ManagerInner>) {
    let mut ticker = tokio::time::interval(inner.config.metrics_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            () = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let active = inner.jobs.read().await.len();
                let queue_depth = INTAKE_CAPACITY - inner.intake_tx.capacity();
                tracing::info!(
                    target: "downpour.download",
                    active,
                    queue_depth,
                    completed = inner.completed_total.load(Ordering::Relaxed),
                    failed = inner.failed_total.load(Ordering::Relaxed),
                    "download manager status"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests;
