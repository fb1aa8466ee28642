//! Media conversion operations invoked from the GUI.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use downpour_core::{
    AudioQuality, ConversionOutcome, Converter, CoreError, CoreResult, ImageFormat, QualityPreset,
    SpeedPreset,
};

/// Handler for one-shot media conversions.
pub struct ConvertHandler {
    converter: Arc<dyn Converter>,
    root: Mutex<CancellationToken>,
}

impl ConvertHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            root: Mutex::new(CancellationToken::new()),
        }
    }

    fn child_token(&self) -> CancellationToken {
        self.root.lock().expect("token lock").child_token()
    }

    /// Cancel every in-flight conversion.
    pub fn cancel_active(&self) {
        let mut root = self.root.lock().expect("token lock");
        root.cancel();
        *root = CancellationToken::new();
    }

    fn require_file(op: &'static str, input: &Path) -> CoreResult<()> {
        if input.is_file() {
            Ok(())
        } else {
            Err(CoreError::not_found(op, format!("input file {}", input.display()))
                .with_user_message("The selected file no longer exists."))
        }
    }

    /// Re-encode a video into another container.
    pub async fn convert_video(
        &self,
        input: &Path,
        container: &str,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome> {
        const OP: &str = "ConvertHandler.ConvertVideo";
        Self::require_file(OP, input)?;
        self.converter
            .convert_video(&self.child_token(), input, container, quality, speed)
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    /// Extract the audio track of a video.
    pub async fn extract_audio(
        &self,
        input: &Path,
        format: &str,
        quality: AudioQuality,
    ) -> CoreResult<ConversionOutcome> {
        const OP: &str = "ConvertHandler.ExtractAudio";
        Self::require_file(OP, input)?;
        self.converter
            .extract_audio(&self.child_token(), input, format, quality)
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    /// Convert an image to another format.
    pub async fn convert_image(
        &self,
        input: &Path,
        format: ImageFormat,
        quality: u8,
    ) -> CoreResult<ConversionOutcome> {
        const OP: &str = "ConvertHandler.ConvertImage";
        Self::require_file(OP, input)?;
        self.converter
            .convert_image(&self.child_token(), input, format, quality.min(100))
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    /// Compress an image next to the original.
    pub async fn compress_image(&self, input: &Path, quality: u8) -> CoreResult<ConversionOutcome> {
        const OP: &str = "ConvertHandler.CompressImage";
        Self::require_file(OP, input)?;
        self.converter
            .compress_image(&self.child_token(), input, quality.min(100))
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    /// Compress a video next to the original.
    pub async fn compress_video(
        &self,
        input: &Path,
        quality: QualityPreset,
        speed: SpeedPreset,
    ) -> CoreResult<ConversionOutcome> {
        const OP: &str = "ConvertHandler.CompressVideo";
        Self::require_file(OP, input)?;
        self.converter
            .compress_video(&self.child_token(), input, quality, speed)
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use downpour_core::ErrorKind;
    use std::path::PathBuf;

    struct StubConverter;

    #[async_trait]
    impl Converter for StubConverter {
        async fn convert_video(
            &self,
            _token: &CancellationToken,
            input: &Path,
            container: &str,
            _quality: QualityPreset,
            _speed: SpeedPreset,
        ) -> CoreResult<ConversionOutcome> {
            Ok(ConversionOutcome {
                output_path: input.with_extension(container),
            })
        }

        async fn extract_audio(
            &self,
            _token: &CancellationToken,
            input: &Path,
            format: &str,
            _quality: AudioQuality,
        ) -> CoreResult<ConversionOutcome> {
            Ok(ConversionOutcome {
                output_path: input.with_extension(format),
            })
        }

        async fn convert_image(
            &self,
            _token: &CancellationToken,
            input: &Path,
            format: ImageFormat,
            _quality: u8,
        ) -> CoreResult<ConversionOutcome> {
            Ok(ConversionOutcome {
                output_path: input.with_extension(format.extension()),
            })
        }

        async fn compress_image(
            &self,
            _token: &CancellationToken,
            input: &Path,
            _quality: u8,
        ) -> CoreResult<ConversionOutcome> {
            Ok(ConversionOutcome {
                output_path: input.to_path_buf(),
            })
        }

        async fn compress_video(
            &self,
            _token: &CancellationToken,
            input: &Path,
            _quality: QualityPreset,
            _speed: SpeedPreset,
        ) -> CoreResult<ConversionOutcome> {
            Ok(ConversionOutcome {
                output_path: input.to_path_buf(),
            })
        }
    }

    #[tokio::test]
    async fn missing_input_is_not_found() {
        let handler = ConvertHandler::new(Arc::new(StubConverter));
        let err = handler
            .convert_video(
                &PathBuf::from("/nonexistent/clip.mkv"),
                "mp4",
                QualityPreset::Balanced,
                SpeedPreset::Medium,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.op(), "ConvertHandler.ConvertVideo");
    }

    #[tokio::test]
    async fn existing_input_converts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mkv");
        std::fs::write(&input, b"stub").unwrap();

        let handler = ConvertHandler::new(Arc::new(StubConverter));
        let outcome = handler
            .convert_video(&input, "mp4", QualityPreset::High, SpeedPreset::Fast)
            .await
            .unwrap();
        assert_eq!(outcome.output_path.extension().unwrap(), "mp4");
    }
}
