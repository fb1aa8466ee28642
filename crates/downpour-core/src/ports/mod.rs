//! Port definitions (trait abstractions) for infrastructure collaborators.
//!
//! Ports list only the operations their consumers use, in domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - No process/filesystem implementation details
//! - Cancellation flows through `CancellationToken` parameters

pub mod converter;
pub mod download_repository;
pub mod event_emitter;
pub mod extractor;
pub mod roadmap_store;
pub mod settings_repository;
pub mod transcriber;

pub use converter::Converter;
pub use download_repository::DownloadRepository;
pub use event_emitter::{EventEmitter, NoopEmitter};
pub use extractor::{Extractor, LogCallback, ProgressCallback};
pub use roadmap_store::RoadmapStore;
pub use settings_repository::SettingsRepository;
pub use transcriber::Transcriber;
