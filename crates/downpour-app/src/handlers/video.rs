//! Download operations invoked from the GUI.

use downpour_core::validate::{positive_or, validate_url};
use downpour_core::{
    CoreError, CoreResult, Download, DownloadOptions, DEFAULT_ACCELERATOR_CONNECTIONS,
    MAX_ACCELERATOR_CONNECTIONS,
};
use downpour_download::DownloadManager;

/// Handler for queue/history operations.
pub struct VideoHandler {
    manager: DownloadManager,
}

impl VideoHandler {
    /// Create the handler.
    #[must_use]
    pub const fn new(manager: DownloadManager) -> Self {
        Self { manager }
    }

    /// Validate and queue a download.
    pub async fn add_to_queue(&self, mut options: DownloadOptions) -> CoreResult<Download> {
        const OP: &str = "VideoHandler.AddToQueue";

        let url = validate_url(&options.url)
            .map_err(|e| CoreError::wrap(OP, e).with_user_message("Enter a valid video URL."))?;
        options.url = url.to_string();

        options.accelerator_connections = positive_or(
            i64::from(options.accelerator_connections),
            DEFAULT_ACCELERATOR_CONNECTIONS,
            Some(MAX_ACCELERATOR_CONNECTIONS),
        );

        if let Some(trim) = options.trim {
            if !trim.is_valid() {
                tracing::warn!(target: "downpour.app", url = %options.url, "dropping invalid trim range");
                options.trim = None;
            }
        }

        self.manager
            .add_job(options)
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    /// Cancel a download by id.
    pub async fn cancel(&self, id: &str) -> CoreResult<()> {
        const OP: &str = "VideoHandler.CancelDownload";
        self.manager.cancel_job(id).await.map_err(|e| {
            CoreError::wrap(OP, e).with_user_message("The download could not be cancelled.")
        })
    }

    /// All queued/running downloads.
    pub async fn queue(&self) -> CoreResult<Vec<Download>> {
        self.manager
            .queue()
            .await
            .map_err(|e| CoreError::wrap("VideoHandler.GetQueue", e))
    }

    /// Finished downloads, newest first.
    pub async fn history(&self, limit: u32) -> CoreResult<Vec<Download>> {
        self.manager
            .history(limit)
            .await
            .map_err(|e| CoreError::wrap("VideoHandler.GetHistory", e))
    }

    /// Delete all finished downloads.
    pub async fn clear_history(&self) -> CoreResult<u64> {
        self.manager
            .clear_history()
            .await
            .map_err(|e| CoreError::wrap("VideoHandler.ClearHistory", e))
    }
}
