//! Transcription engine port.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{TranscriptFormat, Transcription, TranscriptionRequest, WhisperModelInfo};
use crate::error::CoreResult;

/// Contract with the local speech-to-text engine.
///
/// Long operations emit `whisper:*` progress events through the emitter
/// the implementation was constructed with, and honor `token`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Models present on disk.
    async fn installed_models(&self) -> CoreResult<Vec<WhisperModelInfo>>;

    /// Catalog of models available for download (installed ones flagged).
    async fn available_models(&self) -> CoreResult<Vec<WhisperModelInfo>>;

    /// Download a model by catalog name.
    async fn download_model(&self, token: &CancellationToken, name: &str) -> CoreResult<()>;

    /// Delete a locally installed model.
    async fn delete_model(&self, name: &str) -> CoreResult<()>;

    /// Whether the engine binary is installed.
    async fn binary_installed(&self) -> CoreResult<bool>;

    /// Download and install the engine binary.
    async fn download_binary(&self, token: &CancellationToken) -> CoreResult<()>;

    /// Transcribe a local media file.
    async fn transcribe(
        &self,
        token: &CancellationToken,
        request: &TranscriptionRequest,
    ) -> CoreResult<Transcription>;

    /// Render a finished transcription into a document format.
    fn export(&self, transcription: &Transcription, format: TranscriptFormat)
        -> CoreResult<String>;
}
