//! Process-wide logging setup.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Environment variable forcing verbose logging regardless of build.
const DEBUG_ENV: &str = "DOWNPOUR_DEBUG";

/// Maximum retained log files.
const MAX_LOG_FILES: usize = 5;

/// Initialize tracing: stderr plus rotated files under `logs_dir`.
///
/// Keep the returned guard alive for the process lifetime; dropping it
/// stops the background log writer.
pub fn init_logging(logs_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let default_level = if std::env::var_os(DEBUG_ENV).is_some() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("downpour={default_level}")));

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("downpour")
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(logs_dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}
