//! Settings operations invoked from the GUI.

use std::sync::Arc;

use downpour_core::{
    validate_settings, CoreError, CoreResult, Settings, SettingsRepository, SettingsUpdate,
};

/// Handler for reading and updating application settings.
pub struct SettingsHandler {
    repo: Arc<dyn SettingsRepository>,
}

impl SettingsHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self { repo }
    }

    /// Current settings (defaults when never saved).
    pub async fn get(&self) -> CoreResult<Settings> {
        self.repo
            .load()
            .await
            .map_err(|e| CoreError::wrap("SettingsHandler.Get", e))
    }

    /// Apply a partial update and persist the merged result.
    ///
    /// Unknown keys were already rejected when the update deserialized;
    /// value ranges are checked here before anything is written.
    pub async fn update(&self, update: SettingsUpdate) -> CoreResult<Settings> {
        const OP: &str = "SettingsHandler.Update";

        let mut settings = self.repo.load().await.map_err(|e| CoreError::wrap(OP, e))?;
        settings.merge(&update);
        validate_settings(&settings).map_err(|e| {
            CoreError::wrap(OP, e).with_user_message("One of the settings values is invalid.")
        })?;
        self.repo
            .save(&settings)
            .await
            .map_err(|e| CoreError::wrap(OP, e))?;
        Ok(settings)
    }
}
