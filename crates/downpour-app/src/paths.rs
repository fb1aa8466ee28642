//! Data-directory layout.
//!
//! One root holds everything: the store file, downloaded media, external
//! binaries, whisper models, and logs.

use std::path::{Path, PathBuf};

use downpour_core::{CoreError, CoreResult};

/// Resolved application directories.
#[derive(Debug, Clone)]
pub struct DataPaths {
    /// Root data directory.
    pub root: PathBuf,
    /// SQLite store file.
    pub database: PathBuf,
    /// Downloaded videos.
    pub videos: PathBuf,
    /// Downloaded/converted images.
    pub images: PathBuf,
    /// External binaries (yt-dlp, aria2c, whisper-cli).
    pub bin: PathBuf,
    /// Whisper GGML models.
    pub models: PathBuf,
    /// Rotated log files.
    pub logs: PathBuf,
}

impl DataPaths {
    /// Resolve under the platform data directory.
    pub fn resolve() -> CoreResult<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            CoreError::internal("Paths.Resolve", "no platform data directory")
        })?;
        Ok(Self::under(&base.join("downpour")))
    }

    /// Lay the directories out under an explicit root.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            database: root.join("downpour.db"),
            videos: root.join("videos"),
            images: root.join("images"),
            bin: root.join("bin"),
            models: root.join("models"),
            logs: root.join("logs"),
        }
    }

    /// Create every directory that doesn't exist yet.
    pub fn ensure(&self) -> CoreResult<()> {
        for dir in [
            &self.root,
            &self.videos,
            &self.images,
            &self.bin,
            &self.models,
            &self.logs,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                CoreError::permission_denied(
                    "Paths.Ensure",
                    format!("cannot create {}: {e}", dir.display()),
                )
                .with_source(e)
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_under_one_root() {
        let paths = DataPaths::under(Path::new("/data/downpour"));
        assert_eq!(paths.database, PathBuf::from("/data/downpour/downpour.db"));
        assert_eq!(paths.bin, PathBuf::from("/data/downpour/bin"));
        assert_eq!(paths.logs, PathBuf::from("/data/downpour/logs"));
    }

    #[test]
    fn ensure_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::under(&dir.path().join("app"));
        paths.ensure().unwrap();
        assert!(paths.videos.is_dir());
        assert!(paths.models.is_dir());
    }
}
