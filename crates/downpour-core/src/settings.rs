//! Settings domain types and validation.
//!
//! Pure domain types with no infrastructure dependencies. Unknown keys are
//! ignored when loading persisted settings (forward compatibility) and
//! rejected when the UI writes them ([`SettingsUpdate`] is a closed type).

use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{DEFAULT_ACCELERATOR_CONNECTIONS, MAX_ACCELERATOR_CONNECTIONS};
use crate::error::{CoreError, CoreResult};

/// Application settings.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Default directory for downloaded videos.
    pub video_directory: Option<String>,

    /// Default directory for downloaded images.
    pub image_directory: Option<String>,

    /// Default target format for image conversions.
    pub image_format: Option<String>,

    /// Default image quality (0–100).
    pub image_quality: Option<u8>,

    /// Preferred container for video remuxes (e.g. `"mp4"`).
    pub video_container: Option<String>,

    /// Parallel-download accelerator enabled.
    pub accelerator_enabled: Option<bool>,

    /// Accelerator connection count (1–32).
    pub accelerator_connections: Option<u32>,

    /// New downloads default to incognito.
    pub incognito_default: Option<bool>,

    /// Watch the clipboard for supported media URLs.
    pub clipboard_monitor: Option<bool>,

    /// Fetch the roadmap from the CDN (vs the authenticated upstream API).
    pub roadmap_cdn_enabled: Option<bool>,

    /// Override for the roadmap CDN base URL.
    pub roadmap_cdn_base_url: Option<String>,

    /// Anonymous mode: disables all telemetry.
    pub anonymous_mode: Option<bool>,
}

impl Settings {
    /// Settings with sensible defaults.
    #[must_use]
    pub const fn with_defaults() -> Self {
        Self {
            video_directory: None,
            image_directory: None,
            image_format: None,
            image_quality: Some(85),
            video_container: None,
            accelerator_enabled: Some(false),
            accelerator_connections: Some(DEFAULT_ACCELERATOR_CONNECTIONS),
            incognito_default: Some(false),
            clipboard_monitor: Some(true),
            roadmap_cdn_enabled: Some(true),
            roadmap_cdn_base_url: None,
            anonymous_mode: Some(false),
        }
    }

    /// Merge a partial update, only touching fields that are present.
    pub fn merge(&mut self, update: &SettingsUpdate) {
        macro_rules! apply {
            ($field:ident) => {
                if let Some(value) = &update.$field {
                    self.$field = value.clone();
                }
            };
        }
        apply!(video_directory);
        apply!(image_directory);
        apply!(image_format);
        apply!(image_quality);
        apply!(video_container);
        apply!(accelerator_enabled);
        apply!(accelerator_connections);
        apply!(incognito_default);
        apply!(clipboard_monitor);
        apply!(roadmap_cdn_enabled);
        apply!(roadmap_cdn_base_url);
        apply!(anonymous_mode);
    }
}

/// Partial settings update from the UI.
///
/// Outer `Option` = "field present in the request"; inner value may clear
/// a setting by being `None`. Unknown keys are a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SettingsUpdate {
    pub video_directory: Option<Option<String>>,
    pub image_directory: Option<Option<String>>,
    pub image_format: Option<Option<String>>,
    pub image_quality: Option<Option<u8>>,
    pub video_container: Option<Option<String>>,
    pub accelerator_enabled: Option<Option<bool>>,
    pub accelerator_connections: Option<Option<u32>>,
    pub incognito_default: Option<Option<bool>>,
    pub clipboard_monitor: Option<Option<bool>>,
    pub roadmap_cdn_enabled: Option<Option<bool>>,
    pub roadmap_cdn_base_url: Option<Option<String>>,
    pub anonymous_mode: Option<Option<bool>>,
}

/// Validate a full settings record before it is persisted.
pub fn validate_settings(settings: &Settings) -> CoreResult<()> {
    if let Some(quality) = settings.image_quality {
        if quality > 100 {
            return Err(CoreError::internal(
                "validate.settings",
                format!("image quality {quality} out of range 0..=100"),
            ));
        }
    }
    if let Some(connections) = settings.accelerator_connections {
        if connections == 0 || connections > MAX_ACCELERATOR_CONNECTIONS {
            return Err(CoreError::internal(
                "validate.settings",
                format!("accelerator connections {connections} out of range 1..=32"),
            ));
        }
    }
    if let Some(base) = &settings.roadmap_cdn_base_url {
        sanitize_cdn_base_url(base)?;
    }
    Ok(())
}

/// Sanitize a CDN base URL override.
///
/// Must be HTTPS with a host; query strings are rejected and any path
/// component is discarded.
pub fn sanitize_cdn_base_url(raw: &str) -> CoreResult<Url> {
    let parsed = Url::parse(raw.trim())
        .map_err(|_| CoreError::invalid_url("validate.cdn_base_url", raw))?;
    if parsed.scheme() != "https" {
        return Err(CoreError::invalid_url("validate.cdn_base_url", raw));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(CoreError::invalid_url("validate.cdn_base_url", raw));
    }
    if parsed.query().is_some() {
        return Err(CoreError::invalid_url("validate.cdn_base_url", raw));
    }
    let mut sanitized = parsed;
    sanitized.set_path("");
    sanitized.set_fragment(None);
    Ok(sanitized)
}
