//! Roadmap operations invoked from the GUI.

use std::sync::Arc;

use downpour_core::validate::non_empty_or;
use downpour_core::{CoreError, CoreResult, RoadmapItem};
use downpour_roadmap::RoadmapService;

/// Handler for roadmap reads and manual refreshes.
pub struct RoadmapHandler {
    service: Arc<RoadmapService>,
}

impl RoadmapHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(service: Arc<RoadmapService>) -> Self {
        Self { service }
    }

    /// Fetch the roadmap for a language (blank defaults to English).
    pub async fn fetch(&self, lang: &str) -> CoreResult<Vec<RoadmapItem>> {
        let lang = non_empty_or(lang, "en");
        self.service
            .fetch(&lang)
            .await
            .map_err(|e| {
                CoreError::wrap("RoadmapHandler.Fetch", e)
                    .with_user_message("The roadmap could not be loaded.")
            })
    }

    /// Trigger an immediate background refresh (no jitter).
    pub fn refresh(&self, lang: &str) {
        let lang = non_empty_or(lang, "en");
        self.service.sync_now(&lang);
    }
}
