//! `SQLite` implementation of the `DownloadRepository` port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use downpour_core::{CoreError, CoreResult, Download, DownloadRepository, DownloadStatus};

/// Shared SELECT column list.
///
/// Nullable text columns are coalesced here so row mapping reads plain
/// `String`s; hot-path queries (queue polling, progress writes) don't pay
/// per-row Option juggling for columns the domain treats as empty-able.
const DOWNLOAD_COLUMNS: &str = "\
    id, url, title, thumbnail, duration_secs, uploader, format, audio_only, \
    status, progress, IFNULL(speed, '') AS speed, IFNULL(eta, '') AS eta, \
    file_path, file_size, error_message, created_at, started_at, completed_at";

const ACTIVE_STATUSES: &str = "('pending', 'downloading', 'merging')";
const TERMINAL_STATUSES: &str = "('completed', 'failed', 'cancelled')";

/// `SQLite`-backed download repository.
///
/// The partial unique index on active URLs makes this repository the
/// authority for the one-active-row-per-URL invariant: a conflicting
/// insert surfaces as `AlreadyExists`.
pub struct SqliteDownloadRepository {
    pool: SqlitePool,
}

impl SqliteDownloadRepository {
    /// Create a new repository over an opened pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage(op: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| CoreError::wrap(op, e)
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.kind() == sqlx::error::ErrorKind::UniqueViolation)
}

#[async_trait]
impl DownloadRepository for SqliteDownloadRepository {
    async fn create(&self, download: &Download) -> CoreResult<Download> {
        let mut persisted = download.clone();
        if persisted.id.is_empty() {
            persisted.id = Uuid::new_v4().to_string();
        }

        let result = sqlx::query(
            r#"
            INSERT INTO downloads (
                id, url, title, thumbnail, duration_secs, uploader, format,
                audio_only, status, progress, speed, eta, file_path,
                file_size, error_message, created_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&persisted.id)
        .bind(&persisted.url)
        .bind(&persisted.title)
        .bind(&persisted.thumbnail)
        .bind(persisted.duration_secs.map(|d| d as i64))
        .bind(&persisted.uploader)
        .bind(&persisted.format)
        .bind(persisted.audio_only)
        .bind(persisted.status.as_str())
        .bind(persisted.progress)
        .bind(&persisted.speed)
        .bind(&persisted.eta)
        .bind(&persisted.file_path)
        .bind(persisted.file_size.map(|s| s as i64))
        .bind(&persisted.error)
        .bind(persisted.created_at)
        .bind(persisted.started_at)
        .bind(persisted.completed_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(persisted),
            Err(e) if is_unique_violation(&e) => Err(CoreError::already_exists(
                "DownloadRepository.Create",
                format!("active download for url {}", persisted.url),
            )
            .with_source(e)),
            Err(e) => Err(storage("DownloadRepository.Create")(e)),
        }
    }

    async fn get_by_id(&self, id: &str) -> CoreResult<Download> {
        let row = sqlx::query(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("DownloadRepository.GetByID"))?;

        match row {
            Some(row) => row_to_download(&row),
            None => Err(CoreError::not_found(
                "DownloadRepository.GetByID",
                format!("download {id}"),
            )),
        }
    }

    async fn exists_active_by_url(&self, url: &str) -> CoreResult<Option<Download>> {
        let row = sqlx::query(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads \
             WHERE url = ? AND status IN {ACTIVE_STATUSES} LIMIT 1"
        ))
        .bind(url)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage("DownloadRepository.ExistsActiveByURL"))?;

        row.as_ref().map(row_to_download).transpose()
    }

    async fn get_queue(&self) -> CoreResult<Vec<Download>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads \
             WHERE status IN {ACTIVE_STATUSES} ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("DownloadRepository.GetQueue"))?;

        rows.iter().map(row_to_download).collect()
    }

    async fn get_history(&self, limit: u32) -> CoreResult<Vec<Download>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads \
             WHERE status IN {TERMINAL_STATUSES} \
             ORDER BY completed_at DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("DownloadRepository.GetHistory"))?;

        rows.iter().map(row_to_download).collect()
    }

    async fn get_pending(&self) -> CoreResult<Vec<Download>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOWNLOAD_COLUMNS} FROM downloads \
             WHERE status IN ('pending', 'downloading') ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage("DownloadRepository.GetPending"))?;

        rows.iter().map(row_to_download).collect()
    }

    async fn update(&self, download: &Download) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                title = ?, thumbnail = ?, duration_secs = ?, uploader = ?,
                format = ?, audio_only = ?, status = ?, progress = ?,
                speed = ?, eta = ?, file_path = ?, file_size = ?,
                error_message = ?, started_at = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&download.title)
        .bind(&download.thumbnail)
        .bind(download.duration_secs.map(|d| d as i64))
        .bind(&download.uploader)
        .bind(&download.format)
        .bind(download.audio_only)
        .bind(download.status.as_str())
        .bind(download.progress)
        .bind(&download.speed)
        .bind(&download.eta)
        .bind(&download.file_path)
        .bind(download.file_size.map(|s| s as i64))
        .bind(&download.error)
        .bind(download.started_at)
        .bind(download.completed_at)
        .bind(&download.id)
        .execute(&self.pool)
        .await
        .map_err(storage("DownloadRepository.Update"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(
                "DownloadRepository.Update",
                format!("download {}", download.id),
            ));
        }
        Ok(())
    }

    async fn update_status(&self, id: &str, status: DownloadStatus) -> CoreResult<()> {
        let now = Utc::now();
        let completed_at = status.is_terminal().then_some(now);
        let started_at = (status == DownloadStatus::Downloading).then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                status = ?,
                started_at = COALESCE(?, started_at),
                completed_at = COALESCE(?, completed_at)
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(started_at)
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage("DownloadRepository.UpdateStatus"))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(
                "DownloadRepository.UpdateStatus",
                format!("download {id}"),
            ));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("DownloadRepository.Delete"))?;
        Ok(())
    }

    async fn clear_history(&self) -> CoreResult<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM downloads WHERE status IN {TERMINAL_STATUSES}"
        ))
        .execute(&self.pool)
        .await
        .map_err(storage("DownloadRepository.ClearHistory"))?;
        Ok(result.rows_affected())
    }
}

/// Convert a database row to a `Download`.
fn row_to_download(row: &SqliteRow) -> CoreResult<Download> {
    let col = |e: sqlx::Error| CoreError::wrap("DownloadRepository.MapRow", e);

    let status: String = row.try_get("status").map_err(col)?;
    let duration_secs: Option<i64> = row.try_get("duration_secs").map_err(col)?;
    let file_size: Option<i64> = row.try_get("file_size").map_err(col)?;

    Ok(Download {
        id: row.try_get("id").map_err(col)?,
        url: row.try_get("url").map_err(col)?,
        title: row.try_get("title").map_err(col)?,
        thumbnail: row.try_get("thumbnail").map_err(col)?,
        duration_secs: duration_secs.and_then(|d| u64::try_from(d).ok()),
        uploader: row.try_get("uploader").map_err(col)?,
        format: row.try_get("format").map_err(col)?,
        audio_only: row.try_get("audio_only").map_err(col)?,
        status: DownloadStatus::parse(&status),
        progress: row.try_get("progress").map_err(col)?,
        speed: row.try_get("speed").map_err(col)?,
        eta: row.try_get("eta").map_err(col)?,
        file_path: row.try_get("file_path").map_err(col)?,
        file_size: file_size.and_then(|s| u64::try_from(s).ok()),
        error: row.try_get("error_message").map_err(col)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(col)?,
        started_at: row.try_get::<Option<DateTime<Utc>>, _>("started_at").map_err(col)?,
        completed_at: row
            .try_get::<Option<DateTime<Utc>>, _>("completed_at")
            .map_err(col)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use downpour_core::{DownloadOptions, ErrorKind};

    async fn repo() -> SqliteDownloadRepository {
        SqliteDownloadRepository::new(setup_test_database().await.unwrap())
    }

    fn pending(url: &str) -> Download {
        Download::from_options(&DownloadOptions::for_url(url))
    }

    #[tokio::test]
    async fn create_assigns_id_and_round_trips() {
        let repo = repo().await;
        let mut download = pending("https://example.test/a");
        download.title = "A clip".to_string();
        download.duration_secs = Some(90);

        let created = repo.create(&download).await.unwrap();
        assert!(!created.id.is_empty());

        let loaded = repo.get_by_id(&created.id).await.unwrap();
        assert_eq!(loaded.url, "https://example.test/a");
        assert_eq!(loaded.title, "A clip");
        assert_eq!(loaded.duration_secs, Some(90));
        assert_eq!(loaded.status, DownloadStatus::Pending);
        assert_eq!(loaded.created_at, created.created_at);
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn get_by_id_absent_is_not_found() {
        let repo = repo().await;
        let err = repo.get_by_id("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn second_active_row_for_url_is_rejected() {
        let repo = repo().await;
        repo.create(&pending("https://example.test/a")).await.unwrap();

        let err = repo
            .create(&pending("https://example.test/a"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn terminal_row_frees_the_url() {
        let repo = repo().await;
        let first = repo.create(&pending("https://example.test/a")).await.unwrap();
        repo.update_status(&first.id, DownloadStatus::Completed)
            .await
            .unwrap();

        // A fresh active row for the same URL is now allowed.
        repo.create(&pending("https://example.test/a")).await.unwrap();

        let active = repo
            .exists_active_by_url("https://example.test/a")
            .await
            .unwrap()
            .unwrap();
        assert_ne!(active.id, first.id);
    }

    #[tokio::test]
    async fn queue_is_ordered_by_created_at() {
        let repo = repo().await;
        let mut first = pending("https://example.test/1");
        first.created_at = Utc::now() - chrono::Duration::seconds(10);
        let mut second = pending("https://example.test/2");
        second.created_at = Utc::now();

        // Insert out of order.
        repo.create(&second).await.unwrap();
        repo.create(&first).await.unwrap();

        let queue = repo.get_queue().await.unwrap();
        assert_eq!(queue.len(), 2);
        assert_eq!(queue[0].url, "https://example.test/1");
        assert_eq!(queue[1].url, "https://example.test/2");
    }

    #[tokio::test]
    async fn history_is_terminal_rows_newest_first_with_limit() {
        let repo = repo().await;
        for i in 0..3 {
            let created = repo
                .create(&pending(&format!("https://example.test/{i}")))
                .await
                .unwrap();
            repo.update_status(&created.id, DownloadStatus::Completed)
                .await
                .unwrap();
            // Distinct completed_at ordering.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let active = repo.create(&pending("https://example.test/active")).await.unwrap();

        let history = repo.get_history(2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|d| d.status.is_terminal()));
        assert!(history[0].completed_at >= history[1].completed_at);
        assert!(!history.iter().any(|d| d.id == active.id));
    }

    #[tokio::test]
    async fn update_status_sets_timestamps() {
        let repo = repo().await;
        let created = repo.create(&pending("https://example.test/a")).await.unwrap();

        repo.update_status(&created.id, DownloadStatus::Downloading)
            .await
            .unwrap();
        let downloading = repo.get_by_id(&created.id).await.unwrap();
        assert!(downloading.started_at.is_some());
        assert!(downloading.completed_at.is_none());

        repo.update_status(&created.id, DownloadStatus::Failed)
            .await
            .unwrap();
        let failed = repo.get_by_id(&created.id).await.unwrap();
        assert!(failed.completed_at.is_some());
        assert_eq!(failed.started_at, downloading.started_at);
    }

    #[tokio::test]
    async fn get_pending_returns_restartable_rows() {
        let repo = repo().await;
        let queued = repo.create(&pending("https://example.test/1")).await.unwrap();
        let running = repo.create(&pending("https://example.test/2")).await.unwrap();
        repo.update_status(&running.id, DownloadStatus::Downloading)
            .await
            .unwrap();
        let done = repo.create(&pending("https://example.test/3")).await.unwrap();
        repo.update_status(&done.id, DownloadStatus::Completed)
            .await
            .unwrap();

        let restartable = repo.get_pending().await.unwrap();
        let ids: Vec<_> = restartable.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&queued.id.as_str()));
        assert!(ids.contains(&running.id.as_str()));
        assert!(!ids.contains(&done.id.as_str()));
    }

    #[tokio::test]
    async fn clear_history_then_history_is_empty() {
        let repo = repo().await;
        let created = repo.create(&pending("https://example.test/a")).await.unwrap();
        repo.update_status(&created.id, DownloadStatus::Cancelled)
            .await
            .unwrap();

        let removed = repo.clear_history().await.unwrap();
        assert_eq!(removed, 1);
        assert!(repo.get_history(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_absent_row_is_ok() {
        let repo = repo().await;
        repo.delete("missing").await.unwrap();
    }
}
