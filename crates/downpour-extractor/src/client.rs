//! The yt-dlp client.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use downpour_core::{
    CoreError, CoreResult, DownloadOptions, Extractor, LogCallback, ProgressCallback, VideoFormat,
    VideoInfo,
};

use crate::args::{download_args, info_args, stream_url_args};
use crate::classify::classify_failure;
use crate::progress::parse_progress;
use crate::shutdown::terminate_child;

/// Configuration for the yt-dlp client.
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Path to the downloader binary.
    pub ytdlp_path: PathBuf,
    /// Path to the accelerator binary, when installed.
    pub aria2c_path: Option<PathBuf>,
    /// Timeout for the metadata probe and stream-URL resolution.
    pub info_timeout: Duration,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            aria2c_path: None,
            info_timeout: Duration::from_secs(30),
        }
    }
}

/// Thin facade over the external downloader binary.
pub struct YtDlpClient {
    config: YtDlpConfig,
}

impl YtDlpClient {
    /// Create a client with explicit binary paths.
    #[must_use]
    pub const fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Create a client by probing `PATH` for the binaries.
    pub fn from_path_lookup() -> CoreResult<Self> {
        let ytdlp_path = which::which("yt-dlp").map_err(|_| {
            CoreError::dependency_missing("Extractor.New", "yt-dlp")
                .with_user_message("yt-dlp is not installed.")
        })?;
        let aria2c_path = which::which("aria2c").ok();
        Ok(Self::new(YtDlpConfig {
            ytdlp_path,
            aria2c_path,
            ..YtDlpConfig::default()
        }))
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.config.ytdlp_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self, op: &'static str, cmd: &mut Command) -> CoreResult<Child> {
        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::dependency_missing(op, self.config.ytdlp_path.display().to_string())
                    .with_user_message("yt-dlp is not installed.")
            } else {
                CoreError::wrap(op, e)
            }
        })
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Observes `token` and the configured timeout; the child is
    /// terminated on either.
    async fn run_capture(
        &self,
        op: &'static str,
        token: &CancellationToken,
        args: &[String],
    ) -> CoreResult<(Option<i32>, String, String)> {
        let mut child = self.spawn(op, &mut self.command(args))?;

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");
        let stdout_task = tokio::spawn(read_to_string(stdout));
        let stderr_task = tokio::spawn(read_to_string(stderr));

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| CoreError::wrap(op, e))?,
            () = token.cancelled() => {
                let _ = terminate_child(&mut child).await;
                return Err(CoreError::cancelled(op));
            }
            () = tokio::time::sleep(self.config.info_timeout) => {
                let _ = terminate_child(&mut child).await;
                return Err(CoreError::timeout(op, "downloader did not respond"));
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        Ok((status.code(), stdout, stderr))
    }
}

async fn read_to_string(mut source: impl tokio::io::AsyncRead + Unpin) -> String {
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let _ = source.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[async_trait]
impl Extractor for YtDlpClient {
    async fn video_info(&self, token: &CancellationToken, url: &str) -> CoreResult<VideoInfo> {
        const OP: &str = "Extractor.VideoInfo";

        let (code, stdout, stderr) = self.run_capture(OP, token, &info_args(url)).await?;
        if code != Some(0) {
            return Err(classify_failure(OP, &stderr, code));
        }

        let value: serde_json::Value = serde_json::from_str(&stdout)
            .map_err(|e| CoreError::download_failed(OP, "metadata document was not valid JSON")
                .with_source(e))?;
        Ok(parse_video_info(&value))
    }

    async fn stream_url(
        &self,
        token: &CancellationToken,
        url: &str,
        format: &str,
    ) -> CoreResult<String> {
        const OP: &str = "Extractor.GetStreamURL";

        let (code, stdout, stderr) =
            self.run_capture(OP, token, &stream_url_args(url, format)).await?;
        if code != Some(0) {
            return Err(classify_failure(OP, &stderr, code));
        }

        stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| CoreError::download_failed(OP, "no stream URL in downloader output"))
    }

    async fn download(
        &self,
        token: &CancellationToken,
        options: &DownloadOptions,
        output_dir: &std::path::Path,
        on_progress: ProgressCallback,
        on_log: LogCallback,
    ) -> CoreResult<()> {
        const OP: &str = "Extractor.Download";

        let args = download_args(options, output_dir, self.config.aria2c_path.as_deref());
        tracing::debug!(target: "downpour.extractor", url = %options.url, "starting download");

        let mut child = self.spawn(OP, &mut self.command(&args))?;
        let mut stdout_lines =
            BufReader::new(child.stdout.take().expect("stdout piped")).lines();
        let mut stderr_lines =
            BufReader::new(child.stderr.take().expect("stderr piped")).lines();

        let mut stderr_tail = String::new();
        let mut stdout_done = false;
        let mut stderr_done = false;

        while !(stdout_done && stderr_done) {
            tokio::select! {
                () = token.cancelled() => {
                    let _ = terminate_child(&mut child).await;
                    return Err(CoreError::cancelled(OP));
                }
                line = stdout_lines.next_line(), if !stdout_done => match line {
                    Ok(Some(line)) => {
                        on_log(&line);
                        if let Some(progress) = parse_progress(&line) {
                            on_progress(progress);
                        }
                    }
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        let _ = terminate_child(&mut child).await;
                        return Err(CoreError::wrap(OP, e));
                    }
                },
                line = stderr_lines.next_line(), if !stderr_done => match line {
                    Ok(Some(line)) => {
                        on_log(&line);
                        if !stderr_tail.is_empty() {
                            stderr_tail.push('\n');
                        }
                        stderr_tail.push_str(&line);
                    }
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        let _ = terminate_child(&mut child).await;
                        return Err(CoreError::wrap(OP, e));
                    }
                },
            }
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| CoreError::wrap(OP, e))?,
            () = token.cancelled() => {
                let _ = terminate_child(&mut child).await;
                return Err(CoreError::cancelled(OP));
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(classify_failure(OP, &stderr_tail, status.code()))
        }
    }
}

/// Map the metadata JSON document into a `VideoInfo`.
fn parse_video_info(value: &serde_json::Value) -> VideoInfo {
    let str_of = |key: &str| {
        value
            .get(key)
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let formats = value
        .get("formats")
        .and_then(serde_json::Value::as_array)
        .map(|formats| {
            formats
                .iter()
                .filter_map(|f| {
                    let id = f.get("format_id")?.as_str()?.to_string();
                    let audio_only =
                        f.get("vcodec").and_then(serde_json::Value::as_str) == Some("none");
                    Some(VideoFormat {
                        id,
                        label: f
                            .get("format_note")
                            .or_else(|| f.get("format"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        resolution: f
                            .get("resolution")
                            .and_then(serde_json::Value::as_str)
                            .filter(|r| *r != "audio only")
                            .unwrap_or_default()
                            .to_string(),
                        filesize: f
                            .get("filesize")
                            .or_else(|| f.get("filesize_approx"))
                            .and_then(serde_json::Value::as_u64),
                        audio_only,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    VideoInfo {
        id: str_of("id"),
        title: str_of("title"),
        duration_secs: value
            .get("duration")
            .and_then(serde_json::Value::as_f64)
            .map(|d| d.max(0.0) as u64),
        thumbnail: str_of("thumbnail"),
        uploader: str_of("uploader"),
        width: value
            .get("width")
            .and_then(serde_json::Value::as_u64)
            .and_then(|w| u32::try_from(w).ok()),
        height: value
            .get("height")
            .and_then(serde_json::Value::as_u64)
            .and_then(|h| u32::try_from(h).ok()),
        formats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use downpour_core::ErrorKind;

    #[test]
    fn parses_metadata_document() {
        let doc = serde_json::json!({
            "id": "v1",
            "title": "A clip",
            "duration": 93.4,
            "thumbnail": "https://img.example.test/v1.jpg",
            "uploader": "someone",
            "width": 1920,
            "height": 1080,
            "formats": [
                {"format_id": "299", "format_note": "1080p60", "resolution": "1920x1080",
                 "filesize": 1024, "vcodec": "avc1"},
                {"format_id": "140", "format_note": "medium", "resolution": "audio only",
                 "vcodec": "none"},
            ]
        });

        let info = parse_video_info(&doc);
        assert_eq!(info.title, "A clip");
        assert_eq!(info.duration_secs, Some(93));
        assert_eq!(info.width, Some(1920));
        assert_eq!(info.formats.len(), 2);
        assert!(!info.formats[0].audio_only);
        assert!(info.formats[1].audio_only);
        assert!(info.formats[1].resolution.is_empty());
    }

    #[cfg(unix)]
    mod with_fake_binary {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::{Arc, Mutex};

        /// Write an executable shell script standing in for the binary.
        fn fake_binary(dir: &tempfile::TempDir, script: &str) -> PathBuf {
            let path = dir.path().join("yt-dlp");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh\n{script}").unwrap();
            let mut perms = file.metadata().unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path
        }

        fn client(path: PathBuf) -> YtDlpClient {
            YtDlpClient::new(YtDlpConfig {
                ytdlp_path: path,
                aria2c_path: None,
                info_timeout: Duration::from_secs(5),
            })
        }

        #[tokio::test]
        async fn download_forwards_progress_and_logs() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_binary(
                &dir,
                r#"echo '[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01'
echo '[Merger] Merging formats into "clip.mp4"'
exit 0"#,
            );

            let progresses = Arc::new(Mutex::new(Vec::new()));
            let logs = Arc::new(Mutex::new(Vec::new()));
            let progresses_cb = Arc::clone(&progresses);
            let logs_cb = Arc::clone(&logs);

            client(path)
                .download(
                    &CancellationToken::new(),
                    &DownloadOptions::for_url("https://example.test/a"),
                    dir.path(),
                    Box::new(move |p| progresses_cb.lock().unwrap().push(p)),
                    Box::new(move |l| logs_cb.lock().unwrap().push(l.to_string())),
                )
                .await
                .unwrap();

            let progresses = progresses.lock().unwrap();
            assert_eq!(progresses.len(), 2);
            assert!((progresses[0].percent - 50.0).abs() < f64::EPSILON);
            assert_eq!(
                progresses[1].status,
                downpour_core::DownloadStatus::Merging
            );
            assert_eq!(logs.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn download_failure_classifies_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_binary(&dir, "echo 'ERROR: Unsupported URL: x' >&2\nexit 1");

            let err = client(path)
                .download(
                    &CancellationToken::new(),
                    &DownloadOptions::for_url("https://example.test/a"),
                    dir.path(),
                    Box::new(|_| {}),
                    Box::new(|_| {}),
                )
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
        }

        #[tokio::test]
        async fn cancellation_terminates_the_child() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_binary(&dir, "sleep 30");

            let token = CancellationToken::new();
            let cancel = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            });

            let started = std::time::Instant::now();
            let err = client(path)
                .download(
                    &token,
                    &DownloadOptions::for_url("https://example.test/a"),
                    dir.path(),
                    Box::new(|_| {}),
                    Box::new(|_| {}),
                )
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Cancelled);
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn video_info_runs_the_probe() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_binary(
                &dir,
                r#"echo '{"id":"v1","title":"A clip","duration":10,"formats":[]}'"#,
            );

            let info = client(path)
                .video_info(&CancellationToken::new(), "https://example.test/a")
                .await
                .unwrap();
            assert_eq!(info.title, "A clip");
        }

        #[tokio::test]
        async fn stream_url_returns_first_line() {
            let dir = tempfile::tempdir().unwrap();
            let path = fake_binary(&dir, "echo 'https://cdn.example.test/media.mp4'");

            let url = client(path)
                .stream_url(&CancellationToken::new(), "https://example.test/a", "best")
                .await
                .unwrap();
            assert_eq!(url, "https://cdn.example.test/media.mp4");
        }
    }
}
