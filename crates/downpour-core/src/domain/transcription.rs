//! Transcription engine entities.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A curated speech-to-text model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhisperModelInfo {
    /// Model identifier (e.g. `"base.en"`).
    pub name: String,
    /// On-disk filename (e.g. `"ggml-base.en.bin"`).
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Approximate size in bytes.
    pub size_bytes: u64,
    /// Human-readable size (e.g. `"142 MiB"`).
    pub size_display: String,
    /// English-only (faster) vs multilingual.
    pub english_only: bool,
    /// Recommended default model.
    pub is_default: bool,
    /// Whether the file is present locally.
    #[serde(default)]
    pub installed: bool,
}

/// Output document format for a transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptFormat {
    /// Plain text.
    Txt,
    /// SubRip subtitles.
    Srt,
    /// WebVTT subtitles.
    Vtt,
    /// Structured JSON with segments.
    Json,
}

impl TranscriptFormat {
    /// File extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Srt => "srt",
            Self::Vtt => "vtt",
            Self::Json => "json",
        }
    }
}

/// Request to transcribe a local media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRequest {
    /// Path to the local audio/video file.
    pub file_path: PathBuf,
    /// Model name from the catalog.
    pub model: String,
    /// BCP-47-ish language hint; `None` = auto-detect.
    pub language: Option<String>,
    /// Desired document format.
    pub output_format: TranscriptFormat,
}

/// One timed segment of a transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Start offset, seconds.
    pub start: f64,
    /// End offset, seconds.
    pub end: f64,
    /// Transcribed text.
    pub text: String,
}

/// A finished transcription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcription {
    /// Full text, segments joined.
    pub text: String,
    /// Timed segments.
    pub segments: Vec<Segment>,
    /// Detected or requested language.
    pub language: String,
    /// Media duration in seconds.
    pub duration: f64,
}
