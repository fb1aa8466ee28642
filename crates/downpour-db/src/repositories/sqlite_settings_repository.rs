//! `SQLite` implementation of the `SettingsRepository` port.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use downpour_core::{CoreError, CoreResult, Settings, SettingsRepository};

const SETTINGS_KEY: &str = "app_settings";

/// Stores settings as a JSON blob in a key-value table.
///
/// Serde's lenient struct deserialization gives the read-side
/// unknown-keys-ignored behavior for free.
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    /// Create a new settings repository over an opened pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> CoreResult<Settings> {
        let row = sqlx::query("SELECT value FROM settings_kv WHERE key = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::wrap("SettingsRepository.Load", e))?;

        match row {
            Some(row) => {
                let json: String = row.get("value");
                serde_json::from_str(&json)
                    .map_err(|e| CoreError::wrap("SettingsRepository.Load", e))
            }
            None => Ok(Settings::with_defaults()),
        }
    }

    async fn save(&self, settings: &Settings) -> CoreResult<()> {
        let json = serde_json::to_string(settings)
            .map_err(|e| CoreError::wrap("SettingsRepository.Save", e))?;
        let updated_at = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT OR REPLACE INTO settings_kv (key, value, updated_at) VALUES (?, ?, ?)")
            .bind(SETTINGS_KEY)
            .bind(&json)
            .bind(&updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::wrap("SettingsRepository.Save", e))?;

        Ok(())
    }
}
