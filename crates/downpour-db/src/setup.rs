//! Database setup and initialization.
//!
//! `setup_database()` opens (creating if missing) the single-file store
//! with the pragmas the application depends on, then runs the idempotent
//! schema migrations.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::SqlitePool;

/// Memory-mapped I/O window: 256 MiB.
const MMAP_SIZE: &str = "268435456";

/// Open the store and ensure the schema exists.
///
/// Connection configuration:
/// - write-ahead journaling, synchronous NORMAL
/// - foreign keys enforced
/// - 5 s busy timeout
/// - temp tables in memory, 256 MiB mmap window
///
/// # Errors
///
/// Returns an error if the file cannot be opened/created or schema
/// creation fails.
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5))
        .pragma("temp_store", "MEMORY")
        .pragma("mmap_size", MMAP_SIZE);

    let pool = SqlitePool::connect_with(options).await?;
    create_schema(&pool).await?;

    tracing::debug!(target: "downpour.db", path = %db_path.display(), "database ready");
    Ok(pool)
}

/// In-memory store with the full production schema, for tests.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables and indexes.
///
/// Safe to call on every open: all statements use IF NOT EXISTS, and
/// column additions tolerate the column already existing.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS downloads (
            id TEXT PRIMARY KEY,
            url TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            thumbnail TEXT NOT NULL DEFAULT '',
            duration_secs INTEGER,
            uploader TEXT NOT NULL DEFAULT '',
            format TEXT NOT NULL DEFAULT '',
            audio_only INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            progress REAL NOT NULL DEFAULT 0,
            speed TEXT,
            eta TEXT,
            file_path TEXT,
            file_size INTEGER,
            error_message TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Queue and history scans filter on status.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status)")
        .execute(pool)
        .await?;

    // Authoritative one-active-row-per-URL invariant. The AddJob lookup is
    // advisory; this index is what actually rejects a racing duplicate.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_downloads_active_url
        ON downloads(url)
        WHERE status IN ('pending', 'downloading', 'merging')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings_kv (
            key TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS roadmap_cache (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            payload TEXT NOT NULL,
            hash TEXT NOT NULL,
            etag TEXT NOT NULL DEFAULT '',
            lang TEXT NOT NULL DEFAULT 'en',
            fetched_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_creates_all_tables() {
        let pool = setup_test_database().await.unwrap();

        for table in ["downloads", "settings_kv", "roadmap_cache"] {
            let _: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = setup_test_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }
}
