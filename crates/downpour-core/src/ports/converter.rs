//! Media converter port.

use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{AudioQuality, ConversionOutcome, ImageFormat, QualityPreset, SpeedPreset};
use crate::error::CoreResult;

/// Contract with the external media-processing tool.
///
/// All operations are one-shot process invocations; progress is coarse
/// (start/done).
#[async_trait]
pub trait Converter: Send + Sync {
    /// Re-encode a video into `container` with the given presets.
    async fn convert_video(
        &self,
        token: &CancellationToken,
        input: &Path,
        container: &str,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome>;

    /// Extract the audio track.
    async fn extract_audio(
        &self,
        token: &CancellationToken,
        input: &Path,
        format: &str,
        quality: AudioQuality,
    ) -> CoreResult<ConversionOutcome>;

    /// Convert an image to `format` with `quality` in `0..=100`.
    async fn convert_image(
        &self,
        token: &CancellationToken,
        input: &Path,
        format: ImageFormat,
        quality: u8,
    ) -> CoreResult<ConversionOutcome>;

    /// Compress an image next to the original (`_compressed` suffix).
    async fn compress_image(
        &self,
        token: &CancellationToken,
        input: &Path,
        quality: u8,
    ) -> CoreResult<ConversionOutcome>;

    /// Compress a video next to the original (`_compressed` suffix).
    async fn compress_video(
        &self,
        token: &CancellationToken,
        input: &Path,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome>;
}
