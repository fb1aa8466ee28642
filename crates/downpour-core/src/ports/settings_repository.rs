//! Settings repository port.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::settings::Settings;

/// Persistence contract for application settings.
///
/// The implementation handles serialization internally; unknown keys in
/// stored payloads are ignored on load (forward compatibility), writes go
/// through the closed [`Settings`] type.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load settings, defaults when none are stored.
    async fn load(&self) -> CoreResult<Settings>;

    /// Persist the full settings record.
    async fn save(&self, settings: &Settings) -> CoreResult<()>;
}
