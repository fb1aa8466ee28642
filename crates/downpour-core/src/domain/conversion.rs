//! Media conversion presets and outcomes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// CRF-driven quality preset for video encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    /// Visually lossless-ish, large files.
    High,
    /// Good default trade-off.
    Balanced,
    /// Smallest output, visible loss acceptable.
    Small,
}

impl QualityPreset {
    /// Constant-rate factor for x264/x265-family encoders.
    #[must_use]
    pub const fn crf(self) -> u32 {
        match self {
            Self::High => 18,
            Self::Balanced => 23,
            Self::Small => 28,
        }
    }
}

/// Encoding-speed preset (speed vs compression efficiency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    /// Fast encode, larger output.
    Fast,
    /// Encoder default.
    Medium,
    /// Slow encode, best compression.
    Slow,
}

impl SpeedPreset {
    /// The encoder-native preset name.
    #[must_use]
    pub const fn encoder_preset(self) -> &'static str {
        match self {
            Self::Fast => "veryfast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

/// Bitrate preset for audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    /// 128 kbit/s.
    Low,
    /// 192 kbit/s.
    Standard,
    /// 320 kbit/s.
    High,
}

impl AudioQuality {
    /// Bitrate argument in encoder syntax.
    #[must_use]
    pub const fn bitrate(self) -> &'static str {
        match self {
            Self::Low => "128k",
            Self::Standard => "192k",
            Self::High => "320k",
        }
    }
}

/// Target image format for conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG, lossless, alpha-capable.
    Png,
    /// JPEG, lossy, no alpha.
    Jpeg,
    /// WebP, lossy or lossless, alpha-capable.
    Webp,
}

impl ImageFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    /// Whether the format can carry an alpha channel.
    #[must_use]
    pub const fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }
}

/// Result of a one-shot conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionOutcome {
    /// Path of the produced file.
    pub output_path: PathBuf,
}
