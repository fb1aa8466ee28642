//! Download repository port.
//!
//! The download manager depends on this narrow contract rather than a
//! concrete store, so tests can substitute in-memory fakes.

use async_trait::async_trait;

use crate::domain::{Download, DownloadStatus};
use crate::error::CoreResult;

/// Persistence contract for downloads.
///
/// Uniqueness: the implementation is the authority for the
/// one-active-row-per-URL invariant. `create` must fail with
/// `AlreadyExists` when a non-terminal row for the same URL exists;
/// [`DownloadRepository::exists_active_by_url`] is an advisory pre-check
/// only.
#[async_trait]
pub trait DownloadRepository: Send + Sync {
    /// Assign an id and insert; returns the persisted record.
    async fn create(&self, download: &Download) -> CoreResult<Download>;

    /// Fetch by id, `NotFound` when absent.
    async fn get_by_id(&self, id: &str) -> CoreResult<Download>;

    /// The active (non-terminal) row for a URL, if any.
    async fn exists_active_by_url(&self, url: &str) -> CoreResult<Option<Download>>;

    /// All non-terminal rows, `created_at` ascending.
    async fn get_queue(&self) -> CoreResult<Vec<Download>>;

    /// Terminal rows, `completed_at` descending, at most `limit`.
    async fn get_history(&self, limit: u32) -> CoreResult<Vec<Download>>;

    /// Rows in `pending`/`downloading`, for restart recovery.
    async fn get_pending(&self) -> CoreResult<Vec<Download>>;

    /// Write all mutable fields of an existing row.
    async fn update(&self, download: &Download) -> CoreResult<()>;

    /// Write only the status and its timestamp.
    async fn update_status(&self, id: &str, status: DownloadStatus) -> CoreResult<()>;

    /// Delete by id. Deleting an absent row is not an error.
    async fn delete(&self, id: &str) -> CoreResult<()>;

    /// Delete all terminal rows; returns the number removed.
    async fn clear_history(&self) -> CoreResult<u64>;
}
