//! Domain entity types.
//!
//! Pure data with no infrastructure dependencies. Everything here is
//! serde-serializable so values can cross the GUI bridge verbatim.

mod conversion;
mod download;
mod roadmap;
mod transcription;
mod video_info;

pub use conversion::{AudioQuality, ConversionOutcome, ImageFormat, QualityPreset, SpeedPreset};
pub use download::{
    Download, DownloadOptions, DownloadProgress, DownloadStatus, TrimRange,
    DEFAULT_ACCELERATOR_CONNECTIONS, MAX_ACCELERATOR_CONNECTIONS,
};
pub use roadmap::{RoadmapItem, RoadmapSnapshot};
pub use transcription::{
    Segment, TranscriptFormat, Transcription, TranscriptionRequest, WhisperModelInfo,
};
pub use video_info::{VideoFormat, VideoInfo};
