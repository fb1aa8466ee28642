//! Core domain crate for Downpour.
//!
//! This crate holds the pure domain of the application: entity types,
//! the structured error model, input validation, the token-bucket rate
//! limiter, the canonical event union, the application settings model,
//! and the port traits that infrastructure crates implement.
//!
//! # Design Rules
//!
//! - No `sqlx`, `reqwest`, or process types in any public signature
//! - Ports are minimal: they list only the operations their consumers use
//! - Event payloads are copies, never shared mutable state

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod ratelimit;
pub mod settings;
pub mod validate;

// Re-export commonly used types for convenience
pub use domain::{
    AudioQuality, ConversionOutcome, Download, DownloadOptions, DownloadProgress, DownloadStatus,
    ImageFormat, QualityPreset, RoadmapItem, RoadmapSnapshot, Segment, SpeedPreset,
    TranscriptFormat, Transcription, TranscriptionRequest, TrimRange, VideoFormat, VideoInfo,
    WhisperModelInfo, DEFAULT_ACCELERATOR_CONNECTIONS, MAX_ACCELERATOR_CONNECTIONS,
};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use events::AppEvent;
pub use ports::{
    Converter, DownloadRepository, EventEmitter, Extractor, LogCallback, NoopEmitter,
    ProgressCallback, RoadmapStore, SettingsRepository, Transcriber,
};
pub use ratelimit::{limiter, RateLimiter};
pub use settings::{sanitize_cdn_base_url, validate_settings, Settings, SettingsUpdate};
