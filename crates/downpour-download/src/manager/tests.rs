//! Manager behavior tests over in-memory fakes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use downpour_core::{
    AppEvent, CoreError, CoreResult, Download, DownloadOptions, DownloadProgress,
    DownloadRepository, DownloadStatus, EventEmitter, Extractor, LogCallback, ProgressCallback,
    VideoInfo,
};

use super::{DownloadManager, ManagerConfig};

// ───────────────────────── fakes ─────────────────────────

#[derive(Default)]
struct InMemoryRepo {
    rows: Mutex<HashMap<String, Download>>,
    next_id: AtomicUsize,
}

impl InMemoryRepo {
    fn seed(&self, download: Download) {
        self.rows.lock().insert(download.id.clone(), download);
    }

    fn row(&self, id: &str) -> Option<Download> {
        self.rows.lock().get(id).cloned()
    }

    fn row_count(&self) -> usize {
        self.rows.lock().len()
    }
}

#[async_trait]
impl DownloadRepository for InMemoryRepo {
    async fn create(&self, download: &Download) -> CoreResult<Download> {
        let mut rows = self.rows.lock();
        if rows
            .values()
            .any(|d| d.url == download.url && !d.status.is_terminal())
        {
            return Err(CoreError::already_exists("fake.Create", &download.url));
        }
        let mut persisted = download.clone();
        if persisted.id.is_empty() {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            persisted.id = format!("dl-{n}");
        }
        rows.insert(persisted.id.clone(), persisted.clone());
        Ok(persisted)
    }

    async fn get_by_id(&self, id: &str) -> CoreResult<Download> {
        self.row(id)
            .ok_or_else(|| CoreError::not_found("fake.GetByID", id))
    }

    async fn exists_active_by_url(&self, url: &str) -> CoreResult<Option<Download>> {
        Ok(self
            .rows
            .lock()
            .values()
            .find(|d| d.url == url && !d.status.is_terminal())
            .cloned())
    }

    async fn get_queue(&self) -> CoreResult<Vec<Download>> {
        let mut queue: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|d| !d.status.is_terminal())
            .cloned()
            .collect();
        queue.sort_by_key(|d| d.created_at);
        Ok(queue)
    }

    async fn get_history(&self, limit: u32) -> CoreResult<Vec<Download>> {
        let mut history: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|d| d.status.is_terminal())
            .cloned()
            .collect();
        history.sort_by_key(|d| std::cmp::Reverse(d.completed_at));
        history.truncate(limit as usize);
        Ok(history)
    }

    async fn get_pending(&self) -> CoreResult<Vec<Download>> {
        let mut pending: Vec<_> = self
            .rows
            .lock()
            .values()
            .filter(|d| {
                matches!(
                    d.status,
                    DownloadStatus::Pending | DownloadStatus::Downloading
                )
            })
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.created_at);
        Ok(pending)
    }

    async fn update(&self, download: &Download) -> CoreResult<()> {
        let mut rows = self.rows.lock();
        if !rows.contains_key(&download.id) {
            return Err(CoreError::not_found("fake.Update", &download.id));
        }
        rows.insert(download.id.clone(), download.clone());
        Ok(())
    }

    async fn update_status(&self, id: &str, status: DownloadStatus) -> CoreResult<()> {
        let mut rows = self.rows.lock();
        let row = rows
            .get_mut(id)
            .ok_or_else(|| CoreError::not_found("fake.UpdateStatus", id))?;
        row.status = status;
        if status == DownloadStatus::Downloading && row.started_at.is_none() {
            row.started_at = Some(Utc::now());
        }
        if status.is_terminal() {
            row.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        self.rows.lock().remove(id);
        Ok(())
    }

    async fn clear_history(&self) -> CoreResult<u64> {
        let mut rows = self.rows.lock();
        let before = rows.len();
        rows.retain(|_, d| !d.status.is_terminal());
        Ok((before - rows.len()) as u64)
    }
}

#[derive(Default)]
struct RecordingEmitter {
    events: Mutex<Vec<AppEvent>>,
}

impl RecordingEmitter {
    fn all(&self) -> Vec<AppEvent> {
        self.events.lock().clone()
    }

    fn count(&self) -> usize {
        self.events.lock().len()
    }

    fn added_count(&self) -> usize {
        self.all()
            .iter()
            .filter(|e| matches!(e, AppEvent::DownloadAdded { .. }))
            .count()
    }

    /// (status, percent) of every progress event for one job, in order.
    fn progress_for(&self, id: &str) -> Vec<(DownloadStatus, f64)> {
        self.all()
            .iter()
            .filter_map(|e| match e {
                AppEvent::DownloadProgress {
                    id: event_id,
                    status,
                    progress,
                    ..
                } if event_id == id => Some((*status, *progress)),
                _ => None,
            })
            .collect()
    }

    fn terminal_for(&self, id: &str) -> Vec<DownloadStatus> {
        self.progress_for(id)
            .into_iter()
            .filter_map(|(s, _)| s.is_terminal().then_some(s))
            .collect()
    }

    /// Index of the `download:added` event for a job.
    fn added_index(&self, id: &str) -> Option<usize> {
        self.all().iter().position(|e| {
            matches!(e, AppEvent::DownloadAdded { download } if download.id == id)
        })
    }

    fn first_progress_index(&self, id: &str) -> Option<usize> {
        self.all().iter().position(|e| {
            matches!(e, AppEvent::DownloadProgress { id: event_id, .. } if event_id == id)
        })
    }
}

impl EventEmitter for RecordingEmitter {
    fn emit(&self, event: AppEvent) {
        self.events.lock().push(event);
    }

    fn clone_box(&self) -> Box<dyn EventEmitter> {
        Box::new(Self::default())
    }
}

/// Scripted extractor.
///
/// With a gate, each download blocks until a permit is released, which
/// lets tests observe concurrency and cancel mid-flight.
struct FakeExtractor {
    gate: Option<Arc<tokio::sync::Semaphore>>,
    fail: bool,
    info_calls: AtomicUsize,
    download_calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
}

impl FakeExtractor {
    fn instant() -> Self {
        Self::new(None, false)
    }

    fn failing() -> Self {
        Self::new(None, true)
    }

    fn gated(gate: Arc<tokio::sync::Semaphore>) -> Self {
        Self::new(Some(gate), false)
    }

    fn new(gate: Option<Arc<tokio::sync::Semaphore>>, fail: bool) -> Self {
        Self {
            gate,
            fail,
            info_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Extractor for FakeExtractor {
    async fn video_info(&self, token: &CancellationToken, _url: &str) -> CoreResult<VideoInfo> {
        if token.is_cancelled() {
            return Err(CoreError::cancelled("fake.VideoInfo"));
        }
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        Ok(VideoInfo {
            id: "v1".to_string(),
            title: "Probed title".to_string(),
            duration_secs: Some(60),
            thumbnail: "https://img.example.test/v1.jpg".to_string(),
            uploader: "someone".to_string(),
            ..VideoInfo::default()
        })
    }

    async fn stream_url(
        &self,
        _token: &CancellationToken,
        _url: &str,
        _format: &str,
    ) -> CoreResult<String> {
        Ok("https://cdn.example.test/media.mp4".to_string())
    }

    async fn download(
        &self,
        token: &CancellationToken,
        _options: &DownloadOptions,
        _output_dir: &std::path::Path,
        on_progress: ProgressCallback,
        on_log: LogCallback,
    ) -> CoreResult<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(running, Ordering::SeqCst);

        let result = async {
            on_log("[download] Destination: /media/clip.mp4");
            on_progress(DownloadProgress {
                status: DownloadStatus::Downloading,
                percent: 50.0,
                speed: "1.00MiB/s".to_string(),
                eta: "00:05".to_string(),
            });

            if let Some(gate) = &self.gate {
                tokio::select! {
                    () = token.cancelled() => return Err(CoreError::cancelled("fake.Download")),
                    permit = gate.acquire() => permit.expect("gate open").forget(),
                }
            }
            if token.is_cancelled() {
                return Err(CoreError::cancelled("fake.Download"));
            }
            if self.fail {
                return Err(CoreError::download_failed("fake.Download", "scripted failure")
                    .with_user_message("The video could not be downloaded."));
            }
            Ok(())
        }
        .await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ───────────────────────── helpers ─────────────────────────

struct Harness {
    manager: DownloadManager,
    repo: Arc<InMemoryRepo>,
    extractor: Arc<FakeExtractor>,
    emitter: Arc<RecordingEmitter>,
}

fn harness(extractor: FakeExtractor, max_concurrent: usize) -> Harness {
    let repo = Arc::new(InMemoryRepo::default());
    let extractor = Arc::new(extractor);
    let emitter = Arc::new(RecordingEmitter::default());
    let manager = DownloadManager::new(
        Arc::clone(&repo) as _,
        Arc::clone(&extractor) as _,
        Arc::clone(&emitter) as _,
        ManagerConfig {
            max_concurrent,
            flush_interval: Duration::from_millis(10),
            metrics_interval: Duration::from_secs(3600),
            ..ManagerConfig::default()
        },
    );
    Harness {
        manager,
        repo,
        extractor,
        emitter,
    }
}

async fn wait_until<F>(what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..500 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

fn url(n: u32) -> String {
    format!("https://example.test/{n}")
}

// ───────────────────────── tests ─────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn single_job_runs_to_completion() {
    let h = harness(FakeExtractor::instant(), 3);
    h.manager.start().await.unwrap();

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    assert_eq!(added.status, DownloadStatus::Pending);

    let repo = Arc::clone(&h.repo);
    let id = added.id.clone();
    wait_until("job completes", || {
        repo.row(&id)
            .is_some_and(|d| d.status == DownloadStatus::Completed)
    })
    .await;

    let row = h.repo.row(&added.id).unwrap();
    assert!((row.progress - 100.0).abs() < f64::EPSILON);
    assert!(row.completed_at.is_some());
    assert_eq!(row.title, "Probed title");
    assert_eq!(row.file_path.as_deref(), Some("/media/clip.mp4"));

    // Ordering: added precedes first progress; exactly one terminal.
    assert_eq!(h.emitter.added_count(), 1);
    let added_idx = h.emitter.added_index(&added.id).unwrap();
    let progress_idx = h.emitter.first_progress_index(&added.id).unwrap();
    assert!(added_idx < progress_idx);

    let terminals = h.emitter.terminal_for(&added.id);
    assert_eq!(terminals, vec![DownloadStatus::Completed]);
    let (status, percent) = *h.emitter.progress_for(&added.id).last().unwrap();
    assert_eq!(status, DownloadStatus::Completed);
    assert!((percent - 100.0).abs() < f64::EPSILON);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_add_returns_same_row_without_event() {
    let h = harness(FakeExtractor::instant(), 3);

    let first = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    let second = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(h.emitter.added_count(), 1);
    assert_eq!(h.repo.row_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_before_dispatch_skips_the_extractor() {
    let h = harness(FakeExtractor::instant(), 3);

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    h.manager.cancel_job(&added.id).await.unwrap();

    assert_eq!(
        h.repo.row(&added.id).unwrap().status,
        DownloadStatus::Cancelled
    );

    // The worker later picks the job up and must exit without probing.
    h.manager.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.extractor.info_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.extractor.download_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.emitter.terminal_for(&added.id),
        vec![DownloadStatus::Cancelled]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_is_idempotent() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(FakeExtractor::gated(Arc::clone(&gate)), 3);
    h.manager.start().await.unwrap();

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    let extractor = Arc::clone(&h.extractor);
    wait_until("worker running", || {
        extractor.running.load(Ordering::SeqCst) == 1
    })
    .await;

    h.manager.cancel_job(&added.id).await.unwrap();
    h.manager.cancel_job(&added.id).await.unwrap();
    h.manager.cancel_job(&added.id).await.unwrap();

    let repo = Arc::clone(&h.repo);
    let id = added.id.clone();
    wait_until("row cancelled", || {
        repo.row(&id)
            .is_some_and(|d| d.status == DownloadStatus::Cancelled)
    })
    .await;

    let extractor = Arc::clone(&h.extractor);
    wait_until("worker unwound", || {
        extractor.running.load(Ordering::SeqCst) == 0
    })
    .await;

    assert_eq!(
        h.emitter.terminal_for(&added.id),
        vec![DownloadStatus::Cancelled]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn workers_never_exceed_max_concurrent() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(FakeExtractor::gated(Arc::clone(&gate)), 2);
    h.manager.start().await.unwrap();

    for n in 1..=3 {
        h.manager.add_job(DownloadOptions::for_url(url(n))).await.unwrap();
    }

    let extractor = Arc::clone(&h.extractor);
    wait_until("two workers running", || {
        extractor.running.load(Ordering::SeqCst) == 2
    })
    .await;

    // The third job must stay queued while both slots are held.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.extractor.running.load(Ordering::SeqCst), 2);
    let queue = h.manager.queue().await.unwrap();
    assert_eq!(
        queue
            .iter()
            .filter(|d| d.status == DownloadStatus::Pending)
            .count(),
        1
    );

    gate.add_permits(3);
    let repo = Arc::clone(&h.repo);
    wait_until("all jobs complete", || {
        (1..=3).all(|n| {
            repo.rows
                .lock()
                .values()
                .any(|d| d.url == url(n) && d.status == DownloadStatus::Completed)
        })
    })
    .await;

    assert_eq!(h.extractor.max_running.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn incognito_rows_vanish_after_completion() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(FakeExtractor::gated(Arc::clone(&gate)), 3);
    h.manager.start().await.unwrap();

    let mut options = DownloadOptions::for_url(url(1));
    options.incognito = true;
    let added = h.manager.add_job(options).await.unwrap();

    // While running, the row is visible to the queue (deliberate:
    // visibility-for-control).
    let extractor = Arc::clone(&h.extractor);
    wait_until("worker running", || {
        extractor.running.load(Ordering::SeqCst) == 1
    })
    .await;
    assert!(h
        .manager
        .queue()
        .await
        .unwrap()
        .iter()
        .any(|d| d.id == added.id));

    gate.add_permits(1);
    let repo = Arc::clone(&h.repo);
    let id = added.id.clone();
    wait_until("row deleted", || repo.row(&id).is_none()).await;

    assert!(h.manager.queue().await.unwrap().is_empty());
    assert!(h.manager.history(10).await.unwrap().is_empty());
    assert_eq!(
        h.emitter.terminal_for(&added.id),
        vec![DownloadStatus::Completed]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn restart_recovery_requeues_exactly_the_pending_rows() {
    let h = harness(FakeExtractor::instant(), 3);

    // Two restartable rows, one finished one.
    for n in 1..=2 {
        let mut row = Download::from_options(&DownloadOptions::for_url(url(n)));
        row.id = format!("seeded-{n}");
        row.status = if n == 1 {
            DownloadStatus::Pending
        } else {
            DownloadStatus::Downloading
        };
        h.repo.seed(row);
    }
    let mut done = Download::from_options(&DownloadOptions::for_url(url(3)));
    done.id = "seeded-3".to_string();
    done.status = DownloadStatus::Completed;
    done.completed_at = Some(Utc::now());
    h.repo.seed(done);

    h.manager.start().await.unwrap();

    let repo = Arc::clone(&h.repo);
    wait_until("both restored jobs complete", || {
        ["seeded-1", "seeded-2"].iter().all(|id| {
            repo.row(id)
                .is_some_and(|d| d.status == DownloadStatus::Completed)
        })
    })
    .await;

    assert_eq!(h.extractor.download_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.repo.row_count(), 3);
    // Jobs kept their original ids.
    assert!(h.repo.row("seeded-1").is_some());
    // The finished row was untouched.
    assert_eq!(
        h.repo.row("seeded-3").unwrap().status,
        DownloadStatus::Completed
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_download_surfaces_user_message() {
    let h = harness(FakeExtractor::failing(), 3);
    h.manager.start().await.unwrap();

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();

    let repo = Arc::clone(&h.repo);
    let id = added.id.clone();
    wait_until("row failed", || {
        repo.row(&id)
            .is_some_and(|d| d.status == DownloadStatus::Failed)
    })
    .await;

    let row = h.repo.row(&added.id).unwrap();
    assert_eq!(
        row.error.as_deref(),
        Some("The video could not be downloaded.")
    );
    assert!(row.completed_at.is_some());
    // Partial success persisted: the probe metadata survived the failure.
    assert_eq!(row.title, "Probed title");
    assert_eq!(h.emitter.terminal_for(&added.id), vec![DownloadStatus::Failed]);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_drains_workers_and_silences_events() {
    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(FakeExtractor::gated(Arc::clone(&gate)), 3);
    h.manager.start().await.unwrap();

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    let extractor = Arc::clone(&h.extractor);
    wait_until("worker running", || {
        extractor.running.load(Ordering::SeqCst) == 1
    })
    .await;

    h.manager.stop().await;
    assert_eq!(h.extractor.running.load(Ordering::SeqCst), 0);

    // Shutdown drain is not a user cancel: the row stays restartable.
    let row = h.repo.row(&added.id).unwrap();
    assert!(!row.status.is_terminal());

    let count = h.emitter.count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.emitter.count(), count, "no events after stop");
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_history_empties_history() {
    let h = harness(FakeExtractor::instant(), 3);
    h.manager.start().await.unwrap();

    let added = h.manager.add_job(DownloadOptions::for_url(url(1))).await.unwrap();
    let repo = Arc::clone(&h.repo);
    let id = added.id.clone();
    wait_until("job completes", || {
        repo.row(&id)
            .is_some_and(|d| d.status == DownloadStatus::Completed)
    })
    .await;

    assert_eq!(h.manager.clear_history().await.unwrap(), 1);
    assert!(h.manager.history(10).await.unwrap().is_empty());
}
