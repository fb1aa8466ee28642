//! One-shot ffmpeg invocation.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use downpour_core::{CoreError, CoreResult};

/// Run ffmpeg with `args`, honoring cancellation.
///
/// Non-zero exit maps to `ConversionFailed` with the stderr tail
/// preserved in the chain.
pub(crate) async fn run_ffmpeg(
    op: &'static str,
    token: &CancellationToken,
    binary: &Path,
    args: &[String],
) -> CoreResult<()> {
    let mut child = Command::new(binary)
        // Never prompt; overwrite is decided by our path policy.
        .arg("-y")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoreError::dependency_missing(op, binary.display().to_string())
                    .with_user_message("ffmpeg is not installed.")
            } else {
                CoreError::wrap(op, e)
            }
        })?;

    let mut stderr = child.stderr.take().expect("stderr piped");
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    });

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| CoreError::wrap(op, e))?,
        () = token.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            return Err(CoreError::cancelled(op));
        }
    };

    if status.success() {
        return Ok(());
    }

    let stderr = stderr_task.await.unwrap_or_default();
    // The useful diagnostics sit at the end of ffmpeg's output.
    let tail: String = stderr
        .lines()
        .rev()
        .take(8)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n");

    Err(CoreError::conversion_failed(
        op,
        format!("ffmpeg exited with {status}: {tail}"),
    )
    .with_user_message("The conversion failed."))
}
