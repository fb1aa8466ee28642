//! Canonical event union for everything the core publishes to the GUI shell.
//!
//! This module is the single source of truth for event names and payload
//! shapes. The GUI subscribes by name; the core only publishes.
//!
//! # Wire Format
//!
//! Payloads are serialized with a `type` tag and camelCase fields:
//!
//! ```json
//! { "type": "download_progress", "id": "…", "progress": 42.5 }
//! ```
//!
//! Emission is best-effort and non-blocking; intermediate progress may be
//! dropped by the transport, terminal statuses may not.

use serde::{Deserialize, Serialize};

use crate::domain::{Download, DownloadStatus, RoadmapItem};

/// Canonical event types for the GUI bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    // ========== Download Events ==========
    /// A download was accepted into the queue. Exactly once per job,
    /// before any progress for that id.
    DownloadAdded {
        /// Full persisted record.
        download: Download,
    },

    /// Progress for one job. Batched at ~50 ms; terminal statuses are
    /// emitted immediately.
    DownloadProgress {
        /// Job id.
        id: String,
        /// Current status.
        status: DownloadStatus,
        /// Percent in `[0, 100]`.
        progress: f64,
        /// Speed, verbatim short string.
        speed: String,
        /// ETA, verbatim short string.
        eta: String,
        /// Thumbnail URL for list rendering.
        thumbnail: String,
    },

    /// A raw extractor output line. Best-effort.
    DownloadLog {
        /// Job id.
        id: String,
        /// Raw line.
        line: String,
    },

    // ========== Shell Events ==========
    /// User-facing console message. Best-effort.
    ConsoleLog {
        /// Message text.
        message: String,
    },

    /// Dependency-install progress (emitted by the launcher collaborator).
    LauncherProgress {
        /// Dependency name.
        name: String,
        /// Percent in `[0, 100]`.
        progress: f64,
        /// Phase label.
        status: String,
    },

    /// All dependencies ready. Once.
    LauncherComplete,

    /// Self-update progress (emitted by the updater collaborator).
    UpdateProgress {
        /// Percent in `[0, 100]`.
        progress: f64,
        /// Phase label.
        status: String,
    },

    /// Update downloaded and ready to apply. Once.
    UpdateComplete,

    /// Emitted once after startup.
    AppReady {
        /// True when onboarding should run (missing dependencies).
        #[serde(rename = "needsSetup")]
        needs_setup: bool,
    },

    /// Protocol-handler invocation forwarded to the UI.
    DeepLink {
        /// The invoking URL.
        url: String,
    },

    /// The clipboard monitor saw a supported media URL.
    ClipboardUrl {
        /// Detected URL.
        url: String,
    },

    // ========== Whisper Events ==========
    /// Transcription binary install progress.
    WhisperBinaryProgress {
        /// Phase label (`"downloading"`, `"extracting"`, `"done"`).
        status: String,
        /// Percent in `[0, 100]`.
        percent: f64,
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Total bytes, 0 when unknown.
        total: u64,
    },

    /// Model download progress.
    WhisperModelProgress {
        /// Model name.
        model: String,
        /// Phase label.
        status: String,
        /// Percent in `[0, 100]`.
        percent: f64,
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Total bytes, 0 when unknown.
        total: u64,
    },

    /// Transcription progress.
    WhisperTranscribeProgress {
        /// Phase label (`"loading"`, `"transcribing"`).
        status: String,
        /// Percent in `[0, 100]`.
        percent: f64,
    },

    // ========== Roadmap Events ==========
    /// Background sync observed a changed roadmap.
    RoadmapUpdate {
        /// New items.
        items: Vec<RoadmapItem>,
    },
}

impl AppEvent {
    /// Wire name for GUI subscriptions.
    ///
    /// This is the contract with the frontend; names here never change
    /// without a matching frontend release.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::DownloadAdded { .. } => "download:added",
            Self::DownloadProgress { .. } => "download:progress",
            Self::DownloadLog { .. } => "download:log",
            Self::ConsoleLog { .. } => "console:log",
            Self::LauncherProgress { .. } => "launcher:progress",
            Self::LauncherComplete => "launcher:complete",
            Self::UpdateProgress { .. } => "update:progress",
            Self::UpdateComplete => "update:complete",
            Self::AppReady { .. } => "app:ready",
            Self::DeepLink { .. } => "deep-link",
            Self::ClipboardUrl { .. } => "clipboard:url",
            Self::WhisperBinaryProgress { .. } => "whisper:binary-progress",
            Self::WhisperModelProgress { .. } => "whisper:model-progress",
            Self::WhisperTranscribeProgress { .. } => "whisper:transcribe-progress",
            Self::RoadmapUpdate { .. } => "roadmap:update",
        }
    }

    /// Create a progress event from a download snapshot.
    #[must_use]
    pub fn progress_of(download: &Download) -> Self {
        Self::DownloadProgress {
            id: download.id.clone(),
            status: download.status,
            progress: download.progress,
            speed: download.speed.clone(),
            eta: download.eta.clone(),
            thumbnail: download.thumbnail.clone(),
        }
    }

    /// Create a `download:log` event.
    pub fn download_log(id: impl Into<String>, line: impl Into<String>) -> Self {
        Self::DownloadLog {
            id: id.into(),
            line: line.into(),
        }
    }

    /// Create a `console:log` event.
    pub fn console_log(message: impl Into<String>) -> Self {
        Self::ConsoleLog {
            message: message.into(),
        }
    }
}
