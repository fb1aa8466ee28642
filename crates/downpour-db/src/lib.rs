//! SQLite persistence for Downpour.
//!
//! This crate implements the repository ports from `downpour-core` on top
//! of a single-file SQLite database opened in WAL mode.

mod repositories;
mod setup;

pub use repositories::{
    SqliteDownloadRepository, SqliteRoadmapRepository, SqliteSettingsRepository,
};
pub use setup::setup_database;

#[cfg(any(test, feature = "test-utils"))]
pub use setup::setup_test_database;
