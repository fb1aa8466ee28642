//! The ffmpeg converter.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use downpour_core::{
    AudioQuality, ConversionOutcome, Converter, CoreError, CoreResult, ImageFormat, QualityPreset,
    SpeedPreset,
};

use crate::paths::{compressed_output_path, converted_output_path};
use crate::runner::run_ffmpeg;

/// Filter flattening transparency onto white.
///
/// Compositing instead of dropping the alpha channel avoids the green
/// fringes some sources show when alpha is discarded outright.
const FLATTEN_FILTER: &str =
    "color=white,format=rgb24[c];[c][0]scale2ref[c][i];[c][i]overlay=format=auto,format=rgb24";

/// ffmpeg-backed implementation of the `Converter` port.
pub struct FfmpegConverter {
    binary_path: PathBuf,
}

impl FfmpegConverter {
    /// Create a converter with an explicit binary path.
    #[must_use]
    pub const fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Create a converter by probing `PATH`.
    pub fn from_path_lookup() -> CoreResult<Self> {
        let binary_path = which::which("ffmpeg").map_err(|_| {
            CoreError::dependency_missing("Converter.New", "ffmpeg")
                .with_user_message("ffmpeg is not installed.")
        })?;
        Ok(Self::new(binary_path))
    }

    async fn run(
        &self,
        op: &'static str,
        token: &CancellationToken,
        args: Vec<String>,
        output: PathBuf,
    ) -> CoreResult<ConversionOutcome> {
        tracing::info!(target: "downpour.convert", output = %output.display(), "conversion started");
        run_ffmpeg(op, token, &self.binary_path, &args).await?;
        tracing::info!(target: "downpour.convert", output = %output.display(), "conversion done");
        Ok(ConversionOutcome {
            output_path: output,
        })
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    async fn convert_video(
        &self,
        token: &CancellationToken,
        input: &Path,
        container: &str,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome> {
        let output = converted_output_path(input, container);
        let args = video_encode_args(input, &output, quality, speed);
        self.run("Converter.ConvertVideo", token, args, output).await
    }

    async fn extract_audio(
        &self,
        token: &CancellationToken,
        input: &Path,
        format: &str,
        quality: AudioQuality,
    ) -> CoreResult<ConversionOutcome> {
        let output = converted_output_path(input, format);
        let args = vec![
            "-i".to_string(),
            input.to_string_lossy().into_owned(),
            "-vn".to_string(),
            "-b:a".to_string(),
            quality.bitrate().to_string(),
            output.to_string_lossy().into_owned(),
        ];
        self.run("Converter.ExtractAudio", token, args, output).await
    }

    async fn convert_image(
        &self,
        token: &CancellationToken,
        input: &Path,
        format: ImageFormat,
        quality: u8,
    ) -> CoreResult<ConversionOutcome> {
        let output = converted_output_path(input, format.extension());
        let args = image_encode_args(input, &output, format, quality);
        self.run("Converter.ConvertImage", token, args, output).await
    }

    async fn compress_image(
        &self,
        token: &CancellationToken,
        input: &Path,
        quality: u8,
    ) -> CoreResult<ConversionOutcome> {
        let output = compressed_output_path(input);
        let format = match input
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("jpg" | "jpeg") => ImageFormat::Jpeg,
            Some("webp") => ImageFormat::Webp,
            _ => ImageFormat::Png,
        };
        let args = image_encode_args(input, &output, format, quality);
        self.run("Converter.CompressImage", token, args, output).await
    }

    async fn compress_video(
        &self,
        token: &CancellationToken,
        input: &Path,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome> {
        let output = compressed_output_path(input);
        let args = video_encode_args(input, &output, quality, speed);
        self.run("Converter.CompressVideo", token, args, output).await
    }
}

/// Arguments for a CRF-driven H.264 encode.
fn video_encode_args(
    input: &Path,
    output: &Path,
    quality: QualityPreset,
    speed: SpeedPreset,
) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-crf".to_string(),
        quality.crf().to_string(),
        "-preset".to_string(),
        speed.encoder_preset().to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Arguments for an image encode, applying the alpha policy.
///
/// Alpha-capable targets keep transparency; JPEG gets the source
/// composited over white first.
fn image_encode_args(
    input: &Path,
    output: &Path,
    format: ImageFormat,
    quality: u8,
) -> Vec<String> {
    let quality = quality.min(100);
    let mut args = vec!["-i".to_string(), input.to_string_lossy().into_owned()];

    if !format.supports_alpha() {
        args.push("-filter_complex".to_string());
        args.push(FLATTEN_FILTER.to_string());
    }

    match format {
        ImageFormat::Jpeg => {
            // ffmpeg's mjpeg scale is 2 (best) to 31 (worst).
            let q = 2 + u32::from(100 - quality) * 29 / 100;
            args.push("-q:v".to_string());
            args.push(q.to_string());
        }
        ImageFormat::Webp => {
            args.push("-quality".to_string());
            args.push(quality.to_string());
        }
        ImageFormat::Png => {
            args.push("-compression_level".to_string());
            args.push("9".to_string());
        }
    }

    args.push(output.to_string_lossy().into_owned());
    args
}
