//! Application bootstrap: build components leaves-first, start the
//! manager and background sync, tear everything down in reverse.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use downpour_convert::FfmpegConverter;
use downpour_core::{sanitize_cdn_base_url, AppEvent, EventEmitter, SettingsRepository as _};
use downpour_db::{
    setup_database, SqliteDownloadRepository, SqliteRoadmapRepository, SqliteSettingsRepository,
};
use downpour_download::{DownloadManager, ManagerConfig};
use downpour_extractor::{YtDlpClient, YtDlpConfig};
use downpour_roadmap::{RoadmapConfig, RoadmapService};
use downpour_transcribe::{WhisperConfig, WhisperEngine};

use crate::events::BroadcastEmitter;
use crate::handlers::{
    ConvertHandler, RoadmapHandler, SettingsHandler, VideoHandler, WhisperHandler,
};
use crate::paths::DataPaths;

/// Bootstrap configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Override for the data directory (tests, portable installs).
    pub data_root: Option<PathBuf>,
    /// Maximum simultaneous downloads.
    pub max_concurrent: usize,
    /// Roadmap language.
    pub roadmap_lang: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_root: None,
            max_concurrent: 3,
            roadmap_lang: "en".to_string(),
        }
    }
}

/// The wired application core handed to the GUI shell.
pub struct AppCore {
    /// Resolved data directories.
    pub paths: DataPaths,
    /// True when onboarding should run (downloader binary missing).
    pub needs_setup: bool,
    /// Download queue/history operations.
    pub video: VideoHandler,
    /// Settings operations.
    pub settings: SettingsHandler,
    /// Roadmap operations.
    pub roadmap: RoadmapHandler,
    /// Transcription operations.
    pub whisper: WhisperHandler,
    /// Conversion operations.
    pub convert: ConvertHandler,
    emitter: Arc<BroadcastEmitter>,
    manager: DownloadManager,
    roadmap_service: Arc<RoadmapService>,
    pool: sqlx::SqlitePool,
}

impl AppCore {
    /// Open the store, construct components in dependency order, restore
    /// pending jobs, start the background tasks, emit `app:ready`.
    pub async fn start(config: AppConfig) -> anyhow::Result<Self> {
        let paths = match &config.data_root {
            Some(root) => DataPaths::under(root),
            None => DataPaths::resolve()?,
        };
        paths.ensure()?;

        let pool = setup_database(&paths.database).await?;
        let download_repo = Arc::new(SqliteDownloadRepository::new(pool.clone()));
        let settings_repo = Arc::new(SqliteSettingsRepository::new(pool.clone()));
        let roadmap_store = Arc::new(SqliteRoadmapRepository::new(pool.clone()));

        let stored = settings_repo.load().await?;
        let emitter = Arc::new(BroadcastEmitter::default());

        let ytdlp = resolve_binary(&paths.bin, "yt-dlp");
        let needs_setup = ytdlp.is_none();
        let extractor = Arc::new(YtDlpClient::new(YtDlpConfig {
            ytdlp_path: ytdlp.unwrap_or_else(|| paths.bin.join("yt-dlp")),
            aria2c_path: resolve_binary(&paths.bin, "aria2c"),
            ..YtDlpConfig::default()
        }));

        let output_dir = stored
            .video_directory
            .clone()
            .map_or_else(|| paths.videos.clone(), PathBuf::from);
        let manager = DownloadManager::new(
            Arc::clone(&download_repo) as _,
            extractor,
            Arc::clone(&emitter) as _,
            ManagerConfig {
                max_concurrent: config.max_concurrent,
                output_dir,
                ..ManagerConfig::default()
            },
        );
        manager.start().await?;

        let mut roadmap_config = RoadmapConfig::default();
        if let Some(base) = stored.roadmap_cdn_base_url.as_deref() {
            roadmap_config.base_url = sanitize_cdn_base_url(base)?;
        }
        let roadmap_service = RoadmapService::new(
            Arc::clone(&roadmap_store) as _,
            Arc::clone(&emitter) as _,
            roadmap_config,
        )?;
        if stored.roadmap_cdn_enabled.unwrap_or(true) {
            tokio::spawn(Arc::clone(&roadmap_service).run_sync_loop(config.roadmap_lang.clone()));
        }

        let whisper_engine = Arc::new(WhisperEngine::new(
            WhisperConfig {
                binary_path: paths.bin.join("whisper-cli"),
                models_dir: paths.models.clone(),
                ..WhisperConfig::default()
            },
            Arc::clone(&emitter) as _,
        )?);

        let ffmpeg =
            resolve_binary(&paths.bin, "ffmpeg").unwrap_or_else(|| paths.bin.join("ffmpeg"));
        let converter = Arc::new(FfmpegConverter::new(ffmpeg));

        emitter.emit(AppEvent::AppReady { needs_setup });
        tracing::info!(
            target: "downpour.app",
            root = %paths.root.display(),
            needs_setup,
            "application core ready"
        );

        Ok(Self {
            video: VideoHandler::new(manager.clone()),
            settings: SettingsHandler::new(settings_repo),
            roadmap: RoadmapHandler::new(Arc::clone(&roadmap_service)),
            whisper: WhisperHandler::new(whisper_engine),
            convert: ConvertHandler::new(converter),
            paths,
            needs_setup,
            emitter,
            manager,
            roadmap_service,
            pool,
        })
    }

    /// Subscribe to the event stream (shell adapter).
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<AppEvent> {
        self.emitter.subscribe()
    }

    /// Shut down in reverse order: drain workers, stop the sync loop,
    /// close the store last.
    pub async fn shutdown(&self) {
        self.manager.stop().await;
        self.roadmap_service.stop();
        self.pool.close().await;
        tracing::info!(target: "downpour.app", "application core stopped");
    }
}

/// Prefer the managed binary under `bin/`, fall back to `PATH`.
fn resolve_binary(bin_dir: &Path, name: &str) -> Option<PathBuf> {
    let local = bin_dir.join(name);
    if local.exists() {
        return Some(local);
    }
    which::which(name).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn start_and_shutdown_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let core = AppCore::start(AppConfig {
            data_root: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        })
        .await
        .unwrap();

        assert!(core.paths.database.exists());
        assert!(core.video.queue().await.unwrap().is_empty());

        core.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_sees_persisted_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_root: Some(dir.path().to_path_buf()),
            ..AppConfig::default()
        };

        {
            let core = AppCore::start(config.clone()).await.unwrap();
            let update = downpour_core::SettingsUpdate {
                image_quality: Some(Some(42)),
                ..downpour_core::SettingsUpdate::default()
            };
            core.settings.update(update).await.unwrap();
            core.shutdown().await;
        }

        let core = AppCore::start(config).await.unwrap();
        assert_eq!(core.settings.get().await.unwrap().image_quality, Some(42));
        core.shutdown().await;
    }
}
