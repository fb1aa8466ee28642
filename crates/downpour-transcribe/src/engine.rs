//! The whisper.cpp engine.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use downpour_core::{
    AppEvent, CoreError, CoreResult, EventEmitter, Segment, TranscriptFormat, Transcriber,
    Transcription, TranscriptionRequest, WhisperModelInfo,
};

use crate::export;
use crate::models;

/// Minimum interval between download-progress events.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

static PROGRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"progress\s*=\s*(?P<percent>\d{1,3})%").expect("valid regex"));

static TRANSCRIBE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Configuration for the whisper engine.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path the engine binary is installed to.
    pub binary_path: PathBuf,
    /// Directory GGML models live in.
    pub models_dir: PathBuf,
    /// Platform-specific prebuilt binary URL; empty when none exists.
    pub binary_url: String,
    /// Override for the model download base URL.
    pub model_base_url: Option<String>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from("bin/whisper-cli"),
            models_dir: PathBuf::from("models"),
            binary_url: String::new(),
            model_base_url: None,
        }
    }
}

/// Local speech-to-text engine wrapping the whisper.cpp CLI.
pub struct WhisperEngine {
    config: WhisperConfig,
    emitter: Arc<dyn EventEmitter>,
    client: reqwest::Client,
}

impl WhisperEngine {
    /// Create the engine.
    pub fn new(config: WhisperConfig, emitter: Arc<dyn EventEmitter>) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| CoreError::wrap("Whisper.New", e))?;
        Ok(Self {
            config,
            emitter,
            client,
        })
    }

    fn model_path(&self, model: &WhisperModelInfo) -> PathBuf {
        self.config.models_dir.join(&model.filename)
    }

    fn model_url(&self, model: &WhisperModelInfo) -> String {
        self.config.model_base_url.as_ref().map_or_else(
            || model.url.clone(),
            |base| format!("{}/{}", base.trim_end_matches('/'), model.filename),
        )
    }

    fn resolve_binary(&self) -> CoreResult<PathBuf> {
        if self.config.binary_path.exists() {
            return Ok(self.config.binary_path.clone());
        }
        which::which("whisper-cli").map_err(|_| {
            CoreError::dependency_missing("Whisper.ResolveBinary", "whisper-cli")
                .with_user_message("The transcription engine is not installed.")
        })
    }

    /// Stream `url` to `dest`, reporting `(downloaded, total)` chunks.
    async fn stream_to_file(
        &self,
        op: &'static str,
        token: &CancellationToken,
        url: &str,
        dest: &Path,
        mut on_chunk: impl FnMut(u64, u64) + Send,
    ) -> CoreResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::wrap(op, e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| {
                CoreError::download_failed(op, format!("request failed: {e}"))
                    .with_code("ERR_NETWORK")
                    .with_source(e)
            })?
            .error_for_status()
            .map_err(|e| {
                CoreError::download_failed(op, format!("server rejected request: {e}"))
                    .with_code("ERR_NETWORK")
                    .with_source(e)
            })?;

        let total = response.content_length().unwrap_or(0);
        let part_path = dest.with_extension("part");
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| CoreError::wrap(op, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        loop {
            let chunk = tokio::select! {
                () = token.cancelled() => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&part_path).await;
                    return Err(CoreError::cancelled(op));
                }
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| {
                CoreError::download_failed(op, format!("stream interrupted: {e}"))
                    .with_code("ERR_NETWORK")
                    .with_source(e)
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| CoreError::wrap(op, e))?;
            downloaded += chunk.len() as u64;
            on_chunk(downloaded, total);
        }

        file.flush().await.map_err(|e| CoreError::wrap(op, e))?;
        drop(file);
        tokio::fs::rename(&part_path, dest)
            .await
            .map_err(|e| CoreError::wrap(op, e))?;
        Ok(())
    }
}

#[async_trait]
impl Transcriber for WhisperEngine {
    async fn installed_models(&self) -> CoreResult<Vec<WhisperModelInfo>> {
        Ok(self
            .available_models()
            .await?
            .into_iter()
            .filter(|m| m.installed)
            .collect())
    }

    async fn available_models(&self) -> CoreResult<Vec<WhisperModelInfo>> {
        let mut all = models::catalog();
        for model in &mut all {
            model.installed = self.model_path(model).exists();
        }
        Ok(all)
    }

    async fn download_model(&self, token: &CancellationToken, name: &str) -> CoreResult<()> {
        const OP: &str = "Whisper.DownloadModel";

        let model = models::find(name)
            .ok_or_else(|| CoreError::not_found(OP, format!("model {name}")))?;
        let dest = self.model_path(&model);
        let url = self.model_url(&model);

        // Model host politeness: downloads share one budget process-wide.
        downpour_core::limiter("model_host", 2.0, 0.5).wait(token).await?;

        let emitter = Arc::clone(&self.emitter);
        let model_name = model.name.clone();
        let mut last_emit: Option<Instant> = None;

        self.stream_to_file(OP, token, &url, &dest, move |downloaded, total| {
            if last_emit.is_some_and(|t| t.elapsed() < PROGRESS_INTERVAL) {
                return;
            }
            last_emit = Some(Instant::now());
            let percent = if total > 0 {
                downloaded as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            emitter.emit(AppEvent::WhisperModelProgress {
                model: model_name.clone(),
                status: "downloading".to_string(),
                percent,
                downloaded,
                total,
            });
        })
        .await?;

        self.emitter.emit(AppEvent::WhisperModelProgress {
            model: model.name.clone(),
            status: "done".to_string(),
            percent: 100.0,
            downloaded: model.size_bytes,
            total: model.size_bytes,
        });
        tracing::info!(target: "downpour.whisper", model = %model.name, "model installed");
        Ok(())
    }

    async fn delete_model(&self, name: &str) -> CoreResult<()> {
        const OP: &str = "Whisper.DeleteModel";

        let model =
            models::find(name).ok_or_else(|| CoreError::not_found(OP, format!("model {name}")))?;
        let path = self.model_path(&model);
        if !path.exists() {
            return Err(CoreError::not_found(OP, format!("model {name} is not installed")));
        }
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| CoreError::wrap(OP, e))
    }

    async fn binary_installed(&self) -> CoreResult<bool> {
        Ok(self.config.binary_path.exists() || which::which("whisper-cli").is_ok())
    }

    async fn download_binary(&self, token: &CancellationToken) -> CoreResult<()> {
        const OP: &str = "Whisper.DownloadBinary";

        if self.config.binary_url.is_empty() {
            return Err(CoreError::dependency_missing(OP, "whisper-cli")
                .with_user_message("No prebuilt transcription engine for this platform."));
        }

        downpour_core::limiter("model_host", 2.0, 0.5).wait(token).await?;

        let emitter = Arc::clone(&self.emitter);
        let mut last_emit: Option<Instant> = None;
        self.stream_to_file(
            OP,
            token,
            &self.config.binary_url.clone(),
            &self.config.binary_path.clone(),
            move |downloaded, total| {
                if last_emit.is_some_and(|t| t.elapsed() < PROGRESS_INTERVAL) {
                    return;
                }
                last_emit = Some(Instant::now());
                let percent = if total > 0 {
                    downloaded as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                emitter.emit(AppEvent::WhisperBinaryProgress {
                    status: "downloading".to_string(),
                    percent,
                    downloaded,
                    total,
                });
            },
        )
        .await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            tokio::fs::set_permissions(&self.config.binary_path, perms)
                .await
                .map_err(|e| CoreError::wrap(OP, e))?;
        }

        self.emitter.emit(AppEvent::WhisperBinaryProgress {
            status: "done".to_string(),
            percent: 100.0,
            downloaded: 0,
            total: 0,
        });
        Ok(())
    }

    async fn transcribe(
        &self,
        token: &CancellationToken,
        request: &TranscriptionRequest,
    ) -> CoreResult<Transcription> {
        const OP: &str = "Whisper.Transcribe";

        let binary = self.resolve_binary()?;
        let model = models::find(&request.model)
            .ok_or_else(|| CoreError::not_found(OP, format!("model {}", request.model)))?;
        let model_path = self.model_path(&model);
        if !model_path.exists() {
            return Err(CoreError::dependency_missing(
                OP,
                format!("model {} is not installed", request.model),
            )
            .with_user_message("Download the transcription model first."));
        }
        if !request.file_path.exists() {
            return Err(CoreError::not_found(
                OP,
                format!("media file {}", request.file_path.display()),
            ));
        }

        let seq = TRANSCRIBE_SEQ.fetch_add(1, Ordering::Relaxed);
        let out_base = std::env::temp_dir().join(format!(
            "downpour-transcript-{}-{seq}",
            std::process::id()
        ));

        let mut cmd = Command::new(&binary);
        cmd.arg("-m")
            .arg(&model_path)
            .arg("-f")
            .arg(&request.file_path)
            .arg("--output-json")
            .arg("--output-file")
            .arg(&out_base)
            .arg("--print-progress")
            .arg("-l")
            .arg(request.language.as_deref().unwrap_or("auto"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::dependency_missing(OP, binary.display().to_string())
            } else {
                CoreError::wrap(OP, e)
            }
        })?;

        let mut stderr_lines =
            BufReader::new(child.stderr.take().expect("stderr piped")).lines();
        let mut stderr_tail = String::new();

        loop {
            let line = tokio::select! {
                () = token.cancelled() => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(CoreError::cancelled(OP));
                }
                line = stderr_lines.next_line() => line.map_err(|e| CoreError::wrap(OP, e))?,
            };
            let Some(line) = line else { break };

            if let Some(captures) = PROGRESS_RE.captures(&line) {
                if let Ok(percent) = captures["percent"].parse::<f64>() {
                    self.emitter.emit(AppEvent::WhisperTranscribeProgress {
                        status: "transcribing".to_string(),
                        percent: percent.clamp(0.0, 100.0),
                    });
                }
            } else {
                if !stderr_tail.is_empty() {
                    stderr_tail.push('\n');
                }
                stderr_tail.push_str(&line);
            }
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| CoreError::wrap(OP, e))?,
            () = token.cancelled() => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(CoreError::cancelled(OP));
            }
        };

        if !status.success() {
            return Err(CoreError::internal(
                OP,
                format!("engine exited with {status}: {}", stderr_tail.trim()),
            )
            .with_user_message("Transcription failed."));
        }

        let json_path = out_base.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| CoreError::wrap(OP, e))?;
        let _ = tokio::fs::remove_file(&json_path).await;

        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| CoreError::wrap(OP, e))?;
        let transcription = parse_whisper_json(&value, request.language.as_deref());

        self.emitter.emit(AppEvent::WhisperTranscribeProgress {
            status: "done".to_string(),
            percent: 100.0,
        });
        Ok(transcription)
    }

    fn export(
        &self,
        transcription: &Transcription,
        format: TranscriptFormat,
    ) -> CoreResult<String> {
        export::render(transcription, format)
    }
}

/// Map the engine's JSON document into a `Transcription`.
fn parse_whisper_json(value: &serde_json::Value, requested_lang: Option<&str>) -> Transcription {
    let segments: Vec<Segment> = value
        .get("transcription")
        .and_then(serde_json::Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let offsets = entry.get("offsets")?;
                    Some(Segment {
                        start: offsets.get("from")?.as_f64()? / 1000.0,
                        end: offsets.get("to")?.as_f64()? / 1000.0,
                        text: entry.get("text")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let language = value
        .pointer("/result/language")
        .and_then(serde_json::Value::as_str)
        .or(requested_lang)
        .unwrap_or("auto")
        .to_string();

    let text = segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let duration = segments.last().map_or(0.0, |s| s.end);

    Transcription {
        text,
        segments,
        language,
        duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downpour_core::NoopEmitter;

    fn engine(models_dir: PathBuf) -> WhisperEngine {
        WhisperEngine::new(
            WhisperConfig {
                models_dir,
                ..WhisperConfig::default()
            },
            Arc::new(NoopEmitter::new()),
        )
        .unwrap()
    }

    #[test]
    fn parses_engine_json() {
        let doc = serde_json::json!({
            "transcription": [
                {"offsets": {"from": 0, "to": 2500}, "text": " Hello world."},
                {"offsets": {"from": 2500, "to": 4000}, "text": " Goodbye."}
            ],
            "result": {"language": "en"}
        });

        let t = parse_whisper_json(&doc, None);
        assert_eq!(t.segments.len(), 2);
        assert!((t.segments[0].end - 2.5).abs() < f64::EPSILON);
        assert_eq!(t.language, "en");
        assert_eq!(t.text, "Hello world. Goodbye.");
        assert!((t.duration - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_lines_match() {
        let captures = PROGRESS_RE
            .captures("whisper_print_progress_callback: progress =  15%")
            .unwrap();
        assert_eq!(&captures["percent"], "15");
    }

    #[tokio::test]
    async fn installed_models_reflect_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();

        let engine = engine(dir.path().to_path_buf());
        let installed = engine.installed_models().await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].name, "base");

        let available = engine.available_models().await.unwrap();
        assert!(available.iter().any(|m| m.name == "base" && m.installed));
        assert!(available.iter().any(|m| m.name == "tiny" && !m.installed));
    }

    #[tokio::test]
    async fn delete_model_requires_presence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path().to_path_buf());

        let err = engine.delete_model("base").await.unwrap_err();
        assert_eq!(err.kind(), downpour_core::ErrorKind::NotFound);

        std::fs::write(dir.path().join("ggml-base.bin"), b"stub").unwrap();
        engine.delete_model("base").await.unwrap();
        assert!(!dir.path().join("ggml-base.bin").exists());
    }

    #[tokio::test]
    async fn unknown_model_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path().to_path_buf());
        let err = engine
            .download_model(&CancellationToken::new(), "enormous")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), downpour_core::ErrorKind::NotFound);
    }
}
