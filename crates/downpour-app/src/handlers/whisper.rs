//! Transcription operations invoked from the GUI.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use downpour_core::{
    CoreError, CoreResult, Transcriber, TranscriptFormat, Transcription, TranscriptionRequest,
    WhisperModelInfo,
};

/// Handler for the transcription engine.
///
/// Long-running operations (model/binary downloads, transcriptions) run
/// on child tokens of one root; `cancel_active` aborts them all and arms
/// a fresh root for subsequent calls.
pub struct WhisperHandler {
    engine: Arc<dyn Transcriber>,
    root: Mutex<CancellationToken>,
}

impl WhisperHandler {
    /// Create the handler.
    #[must_use]
    pub fn new(engine: Arc<dyn Transcriber>) -> Self {
        Self {
            engine,
            root: Mutex::new(CancellationToken::new()),
        }
    }

    fn child_token(&self) -> CancellationToken {
        self.root.lock().expect("token lock").child_token()
    }

    /// Cancel every in-flight engine operation.
    pub fn cancel_active(&self) {
        let mut root = self.root.lock().expect("token lock");
        root.cancel();
        *root = CancellationToken::new();
    }

    /// Models present on disk.
    pub async fn installed_models(&self) -> CoreResult<Vec<WhisperModelInfo>> {
        self.engine
            .installed_models()
            .await
            .map_err(|e| CoreError::wrap("WhisperHandler.InstalledModels", e))
    }

    /// Full model catalog with install state.
    pub async fn available_models(&self) -> CoreResult<Vec<WhisperModelInfo>> {
        self.engine
            .available_models()
            .await
            .map_err(|e| CoreError::wrap("WhisperHandler.AvailableModels", e))
    }

    /// Download a model by name.
    pub async fn download_model(&self, name: &str) -> CoreResult<()> {
        self.engine
            .download_model(&self.child_token(), name)
            .await
            .map_err(|e| {
                CoreError::wrap("WhisperHandler.DownloadModel", e)
                    .with_user_message("The model download failed.")
            })
    }

    /// Delete an installed model.
    pub async fn delete_model(&self, name: &str) -> CoreResult<()> {
        self.engine
            .delete_model(name)
            .await
            .map_err(|e| CoreError::wrap("WhisperHandler.DeleteModel", e))
    }

    /// Whether the engine binary is installed.
    pub async fn binary_installed(&self) -> CoreResult<bool> {
        self.engine
            .binary_installed()
            .await
            .map_err(|e| CoreError::wrap("WhisperHandler.BinaryInstalled", e))
    }

    /// Download and install the engine binary.
    pub async fn download_binary(&self) -> CoreResult<()> {
        self.engine
            .download_binary(&self.child_token())
            .await
            .map_err(|e| {
                CoreError::wrap("WhisperHandler.DownloadBinary", e)
                    .with_user_message("The engine download failed.")
            })
    }

    /// Transcribe a local media file.
    pub async fn transcribe(&self, request: TranscriptionRequest) -> CoreResult<Transcription> {
        self.engine
            .transcribe(&self.child_token(), &request)
            .await
            .map_err(|e| CoreError::wrap("WhisperHandler.Transcribe", e))
    }

    /// Render a transcription into a document format.
    pub fn export(
        &self,
        transcription: &Transcription,
        format: TranscriptFormat,
    ) -> CoreResult<String> {
        self.engine
            .export(transcription, format)
            .map_err(|e| CoreError::wrap("WhisperHandler.Export", e))
    }
}
