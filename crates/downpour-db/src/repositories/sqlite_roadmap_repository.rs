//! `SQLite` implementation of the single-row `RoadmapStore` port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use downpour_core::{CoreError, CoreResult, RoadmapSnapshot, RoadmapStore};

/// Persists the roadmap cache in its single-row table.
pub struct SqliteRoadmapRepository {
    pool: SqlitePool,
}

impl SqliteRoadmapRepository {
    /// Create a new roadmap repository over an opened pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoadmapStore for SqliteRoadmapRepository {
    async fn load(&self) -> CoreResult<Option<RoadmapSnapshot>> {
        let row = sqlx::query(
            "SELECT payload, hash, etag, lang, fetched_at FROM roadmap_cache WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| CoreError::wrap("RoadmapStore.Load", e))?;

        let Some(row) = row else { return Ok(None) };

        let payload: String = row.get("payload");
        let items = serde_json::from_str(&payload)
            .map_err(|e| CoreError::wrap("RoadmapStore.Load", e))?;

        Ok(Some(RoadmapSnapshot {
            items,
            hash: row.get("hash"),
            etag: row.get("etag"),
            lang: row.get("lang"),
            fetched_at: row
                .try_get::<DateTime<Utc>, _>("fetched_at")
                .map_err(|e| CoreError::wrap("RoadmapStore.Load", e))?,
        }))
    }

    async fn save(&self, snapshot: &RoadmapSnapshot) -> CoreResult<()> {
        let payload = serde_json::to_string(&snapshot.items)
            .map_err(|e| CoreError::wrap("RoadmapStore.Save", e))?;

        sqlx::query(
            r#"
            INSERT INTO roadmap_cache (id, payload, hash, etag, lang, fetched_at)
            VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                hash = excluded.hash,
                etag = excluded.etag,
                lang = excluded.lang,
                fetched_at = excluded.fetched_at
            "#,
        )
        .bind(&payload)
        .bind(&snapshot.hash)
        .bind(&snapshot.etag)
        .bind(&snapshot.lang)
        .bind(snapshot.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::wrap("RoadmapStore.Save", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;
    use downpour_core::RoadmapItem;

    fn snapshot(lang: &str, hash: &str) -> RoadmapSnapshot {
        RoadmapSnapshot {
            items: vec![RoadmapItem {
                id: "1".to_string(),
                title: "Playlists".to_string(),
                description: String::new(),
                status: "planned".to_string(),
                category: String::new(),
            }],
            hash: hash.to_string(),
            etag: "\"v1\"".to_string(),
            lang: lang.to_string(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_store_loads_none() {
        let repo = SqliteRoadmapRepository::new(setup_test_database().await.unwrap());
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let repo = SqliteRoadmapRepository::new(setup_test_database().await.unwrap());
        repo.save(&snapshot("en", "abc")).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.hash, "abc");
        assert_eq!(loaded.etag, "\"v1\"");
        assert_eq!(loaded.lang, "en");
    }

    #[tokio::test]
    async fn save_replaces_the_single_row() {
        let repo = SqliteRoadmapRepository::new(setup_test_database().await.unwrap());
        repo.save(&snapshot("en", "abc")).await.unwrap();
        repo.save(&snapshot("de", "def")).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.lang, "de");
        assert_eq!(loaded.hash, "def");
    }
}
