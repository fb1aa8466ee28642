//! Worker: executes one download job end to end.
//!
//! Finalization discipline: whoever removes the job from the map owns the
//! terminal store write and the terminal event. A worker that finds its
//! job already removed (user cancel won the race) exits silently.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use downpour_core::{
    AppEvent, CoreError, Download, DownloadStatus, ErrorKind, LogCallback, ProgressCallback,
};

use super::{Job, ManagerInner};

pub(crate) async fn run(inner: Arc<ManagerInner>, job: Job) {
    let id = job.download.id.clone();

    if job.cancel.is_cancelled() {
        // Cancelled before pickup: CancelJob already finalized the row and
        // emitted the terminal event. Nothing to do, not even a probe.
        let _ = inner.take_job(&id).await;
        return;
    }

    let mut download = job.download.clone();
    download.status = DownloadStatus::Downloading;
    download.started_at = Some(Utc::now());

    if let Err(e) = inner
        .repo
        .update_status(&id, DownloadStatus::Downloading)
        .await
    {
        if e.kind() == ErrorKind::NotFound {
            // Row deleted out from under us (incognito cancel).
            let _ = inner.take_job(&id).await;
            return;
        }
        tracing::warn!(target: "downpour.download", id = %id, error = %e, "status write failed");
    }

    // Immediate 0% frame: the UI sees the job leave "queued" right away.
    inner.emitter.emit(AppEvent::progress_of(&download));

    match inner.extractor.video_info(&job.cancel, &download.url).await {
        Ok(info) => {
            if !info.title.is_empty() {
                download.title = info.title;
            }
            if !info.thumbnail.is_empty() {
                download.thumbnail = info.thumbnail;
            }
            if !info.uploader.is_empty() {
                download.uploader = info.uploader;
            }
            if info.duration_secs.is_some() {
                download.duration_secs = info.duration_secs;
            }

            if let Err(e) = inner.repo.update(&download).await {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(target: "downpour.download", id = %id, error = %e, "metadata write failed");
                }
            }
            // Metadata-derived frame, guaranteed to precede extractor output.
            inner.emitter.emit(AppEvent::progress_of(&download));
        }
        Err(e) if e.kind() == ErrorKind::Cancelled || job.cancel.is_cancelled() => {
            finalize_cancelled(&inner, &job, download).await;
            return;
        }
        Err(e) => {
            finalize_failed(&inner, &job, download, &e).await;
            return;
        }
    }

    if job.cancel.is_cancelled() {
        finalize_cancelled(&inner, &job, download).await;
        return;
    }

    let shared = Arc::new(Mutex::new(download));

    let on_progress: ProgressCallback = {
        let shared = Arc::clone(&shared);
        let inner = Arc::clone(&inner);
        Box::new(move |p| {
            let mut d = shared.lock();
            d.status = p.status;
            d.progress = p.percent;
            d.speed = p.speed;
            d.eta = p.eta;
            inner.progress.update(&d);
        })
    };

    let on_log: LogCallback = {
        let shared = Arc::clone(&shared);
        let inner = Arc::clone(&inner);
        let id = id.clone();
        Box::new(move |line| {
            if let Some(path) = parse_destination(line) {
                shared.lock().file_path = Some(path);
            }
            inner.emitter.emit(AppEvent::download_log(&id, line));
        })
    };

    let result = inner
        .extractor
        .download(
            &job.cancel,
            &job.options,
            &inner.config.output_dir,
            on_progress,
            on_log,
        )
        .await;

    let download = shared.lock().clone();
    match result {
        Ok(()) => finalize_completed(&inner, &job, download).await,
        Err(e) if e.kind() == ErrorKind::Cancelled => {
            finalize_cancelled(&inner, &job, download).await;
        }
        Err(e) => finalize_failed(&inner, &job, download, &e).await,
    }
}

async fn finalize_completed(inner: &Arc<ManagerInner>, job: &Job, mut download: Download) {
    if inner.take_job(&download.id).await.is_none() {
        return;
    }

    download.status = DownloadStatus::Completed;
    download.progress = 100.0;
    download.speed = String::new();
    download.eta = String::new();
    download.completed_at = Some(Utc::now());

    if let Some(path) = download.file_path.clone() {
        if let Ok(meta) = tokio::fs::metadata(&path).await {
            download.file_size = Some(meta.len());
        }
    }

    if job.options.incognito {
        if let Err(e) = inner.repo.delete(&download.id).await {
            tracing::warn!(target: "downpour.download", id = %download.id, error = %e, "incognito delete failed");
        }
    } else if let Err(e) = inner.repo.update(&download).await {
        tracing::warn!(target: "downpour.download", id = %download.id, error = %e, "completion write failed");
    }

    inner
        .completed_total
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    inner.emit_terminal(&download);
    tracing::info!(target: "downpour.download", id = %download.id, title = %download.title, "download completed");
}

async fn finalize_failed(
    inner: &Arc<ManagerInner>,
    job: &Job,
    mut download: Download,
    error: &CoreError,
) {
    if inner.take_job(&download.id).await.is_none() {
        return;
    }

    download.status = DownloadStatus::Failed;
    download.error = Some(error.user_message());
    download.speed = String::new();
    download.eta = String::new();
    download.completed_at = Some(Utc::now());

    if job.options.incognito {
        let _ = inner.repo.delete(&download.id).await;
    } else if let Err(e) = inner.repo.update(&download).await {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(target: "downpour.download", id = %download.id, error = %e, "failure write failed");
        }
    }

    inner
        .failed_total
        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    inner.emit_terminal(&download);
    tracing::warn!(target: "downpour.download", id = %download.id, error = %error, "download failed");
}

async fn finalize_cancelled(inner: &Arc<ManagerInner>, job: &Job, mut download: Download) {
    if inner.shutdown.is_cancelled() {
        // Shutdown drain, not a user cancel: leave the row restartable
        // and emit nothing.
        let _ = inner.take_job(&download.id).await;
        return;
    }
    if inner.take_job(&download.id).await.is_none() {
        // User cancel won the race and already finalized.
        return;
    }

    download.status = DownloadStatus::Cancelled;
    download.completed_at = Some(Utc::now());

    if job.options.incognito {
        let _ = inner.repo.delete(&download.id).await;
    } else if let Err(e) = inner
        .repo
        .update_status(&download.id, DownloadStatus::Cancelled)
        .await
    {
        if e.kind() != ErrorKind::NotFound {
            tracing::warn!(target: "downpour.download", id = %download.id, error = %e, "cancel write failed");
        }
    }

    inner.emit_terminal(&download);
}

/// Pull the destination path out of extractor output lines.
fn parse_destination(line: &str) -> Option<String> {
    for prefix in ["[download] Destination: ", "[ExtractAudio] Destination: "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(rest.trim().to_string());
        }
    }
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        return rest.strip_suffix('"').map(ToString::to_string);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_lines_are_recognized() {
        assert_eq!(
            parse_destination("[download] Destination: /media/clip.f299.mp4").as_deref(),
            Some("/media/clip.f299.mp4")
        );
        assert_eq!(
            parse_destination("[Merger] Merging formats into \"/media/clip.mp4\"").as_deref(),
            Some("/media/clip.mp4")
        );
        assert_eq!(
            parse_destination("[ExtractAudio] Destination: /media/clip.mp3").as_deref(),
            Some("/media/clip.mp3")
        );
        assert!(parse_destination("[download]  42.0% of 1MiB").is_none());
    }
}
