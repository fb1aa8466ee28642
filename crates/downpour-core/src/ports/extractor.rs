//! Extractor client port.
//!
//! Abstracts the external downloader binary so the manager (and its tests)
//! never touch process plumbing.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{DownloadOptions, DownloadProgress, VideoInfo};
use crate::error::CoreResult;

/// Callback receiving parsed progress observations.
pub type ProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync>;

/// Callback receiving every raw output line.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Contract with the external downloader binary.
///
/// All operations observe `token` within one read cycle of the child
/// process; on cancellation the child is terminated (graceful signal,
/// then kill) and the operation returns `Cancelled`.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Metadata-only probe of `url`.
    async fn video_info(&self, token: &CancellationToken, url: &str) -> CoreResult<VideoInfo>;

    /// Direct media URL for the selected format (trimmer preview).
    async fn stream_url(
        &self,
        token: &CancellationToken,
        url: &str,
        format: &str,
    ) -> CoreResult<String>;

    /// Download to `output_dir` per `options`.
    ///
    /// Every parsed progress observation goes to `on_progress`; every raw
    /// line (including malformed progress lines) goes to `on_log`.
    async fn download(
        &self,
        token: &CancellationToken,
        options: &DownloadOptions,
        output_dir: &Path,
        on_progress: ProgressCallback,
        on_log: LogCallback,
    ) -> CoreResult<()>;
}
