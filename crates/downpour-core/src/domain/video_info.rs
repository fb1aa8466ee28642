//! Metadata returned by the extractor's probe.

use serde::{Deserialize, Serialize};

/// One downloadable format advertised by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFormat {
    /// Extractor-native format id (used as the format selector).
    pub id: String,
    /// Human label (e.g. `"1080p60"`).
    pub label: String,
    /// Resolution string (e.g. `"1920x1080"`), empty for audio.
    pub resolution: String,
    /// Size in bytes when the source advertises it.
    pub filesize: Option<u64>,
    /// True for audio-only formats.
    pub audio_only: bool,
}

/// Result of the metadata-only probe.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// Source-native media id.
    pub id: String,
    /// Title.
    pub title: String,
    /// Duration in seconds.
    pub duration_secs: Option<u64>,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Uploader/channel name.
    pub uploader: String,
    /// Pixel width of the best video stream.
    pub width: Option<u32>,
    /// Pixel height of the best video stream.
    pub height: Option<u32>,
    /// Available formats.
    pub formats: Vec<VideoFormat>,
}
