//! SQLite implementations of the repository ports.

mod sqlite_download_repository;
mod sqlite_roadmap_repository;
mod sqlite_settings_repository;

pub use sqlite_download_repository::SqliteDownloadRepository;
pub use sqlite_roadmap_repository::SqliteRoadmapRepository;
pub use sqlite_settings_repository::SqliteSettingsRepository;
