//! Download entity, its status machine, and the options record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default connection count for the parallel-download accelerator.
pub const DEFAULT_ACCELERATOR_CONNECTIONS: u32 = 16;

/// Maximum connection count accepted for the accelerator.
pub const MAX_ACCELERATOR_CONNECTIONS: u32 = 32;

/// Lifecycle status of a download.
///
/// Transitions: `pending → downloading (→ merging) → completed`,
/// `downloading → failed`, any non-terminal `→ cancelled`. Terminal states
/// are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Queued, waiting for a worker slot.
    Pending,
    /// A worker is streaming media.
    Downloading,
    /// Streams downloaded, container merge in progress.
    Merging,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Cancelled by the user.
    Cancelled,
}

impl DownloadStatus {
    /// Stable string form used in the store and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Merging => "merging",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stable string form; unknown values map to `Failed`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "downloading" => Self::Downloading,
            "merging" => Self::Merging,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Failed,
        }
    }

    /// True for `completed`, `failed`, and `cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A download, as persisted in the store.
///
/// The id is opaque and immutable; `completed_at` is set iff the status is
/// terminal. At most one non-terminal row exists per source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    /// Opaque stable identifier assigned by the repository.
    pub id: String,
    /// Source page URL.
    pub url: String,
    /// Media title (from metadata probe, or caller-supplied).
    pub title: String,
    /// Thumbnail URL.
    pub thumbnail: String,
    /// Duration in seconds, when known.
    pub duration_secs: Option<u64>,
    /// Uploader/channel name.
    pub uploader: String,
    /// Requested format descriptor (extractor format selector).
    pub format: String,
    /// Audio-only extraction requested.
    pub audio_only: bool,
    /// Current lifecycle status.
    pub status: DownloadStatus,
    /// Progress percent in `[0, 100]`.
    pub progress: f64,
    /// Current speed, verbatim short string (e.g. `"2.3MiB/s"`).
    pub speed: String,
    /// Current ETA, verbatim short string (e.g. `"00:42"`).
    pub eta: String,
    /// Final file path once known.
    pub file_path: Option<String>,
    /// File size in bytes once known.
    pub file_size: Option<u64>,
    /// Last error message for failed downloads.
    pub error: Option<String>,
    /// Insert timestamp (required).
    pub created_at: DateTime<Utc>,
    /// Set when a worker picks the job up.
    pub started_at: Option<DateTime<Utc>>,
    /// Set on terminal transition.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Download {
    /// Create a new pending download from its options.
    ///
    /// The id is left empty; the repository assigns it at insert.
    #[must_use]
    pub fn from_options(options: &DownloadOptions) -> Self {
        Self {
            id: String::new(),
            url: options.url.clone(),
            title: options.title.clone().unwrap_or_default(),
            thumbnail: options.thumbnail.clone().unwrap_or_default(),
            duration_secs: None,
            uploader: String::new(),
            format: options.format.clone().unwrap_or_default(),
            audio_only: options.audio_only,
            status: DownloadStatus::Pending,
            progress: 0.0,
            speed: String::new(),
            eta: String::new(),
            file_path: None,
            file_size: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

/// Optional trim range, in seconds from the start of the media.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRange {
    /// Inclusive start, seconds.
    pub start_secs: f64,
    /// Exclusive end, seconds.
    pub end_secs: f64,
}

impl TrimRange {
    /// True when `0 <= start < end`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.start_secs >= 0.0 && self.end_secs > self.start_secs
    }
}

/// Input record for queueing a download.
///
/// Only the fields listed here are recognized; unknown keys are rejected
/// at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct DownloadOptions {
    /// Source page URL.
    pub url: String,
    /// Format selector handed to the extractor (`None` = best available).
    pub format: Option<String>,
    /// Extract audio only.
    pub audio_only: bool,
    /// Audio container when `audio_only` (e.g. `"mp3"`).
    pub audio_format: Option<String>,
    /// Audio quality hint when `audio_only` (extractor-native scale).
    pub audio_quality: Option<String>,
    /// Use the parallel-download accelerator.
    pub accelerator_enabled: bool,
    /// Accelerator connection count, `1..=32`.
    pub accelerator_connections: u32,
    /// Browser to read cookies from (e.g. `"firefox"`).
    pub cookies_from_browser: Option<String>,
    /// Delete the row on terminal transition; never appears in history.
    pub incognito: bool,
    /// Optional trim range.
    pub trim: Option<TrimRange>,
    /// Caller-supplied title for immediate UI feedback.
    pub title: Option<String>,
    /// Caller-supplied thumbnail for immediate UI feedback.
    pub thumbnail: Option<String>,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            url: String::new(),
            format: None,
            audio_only: false,
            audio_format: None,
            audio_quality: None,
            accelerator_enabled: false,
            accelerator_connections: DEFAULT_ACCELERATOR_CONNECTIONS,
            cookies_from_browser: None,
            incognito: false,
            trim: None,
            title: None,
            thumbnail: None,
        }
    }
}

impl DownloadOptions {
    /// Options for a plain best-quality download of `url`.
    #[must_use]
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Accelerator connection count clamped to the accepted range.
    #[must_use]
    pub fn effective_connections(&self) -> u32 {
        if self.accelerator_connections == 0 {
            DEFAULT_ACCELERATOR_CONNECTIONS
        } else {
            self.accelerator_connections.min(MAX_ACCELERATOR_CONNECTIONS)
        }
    }
}

/// A single progress observation, as parsed from extractor output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    /// Phase the observation belongs to.
    pub status: DownloadStatus,
    /// Percent in `[0, 100]`; resets to 0 at the merge boundary.
    pub percent: f64,
    /// Speed, verbatim short string.
    pub speed: String,
    /// ETA, verbatim short string.
    pub eta: String,
}

impl DownloadProgress {
    /// A zero-progress observation in the given phase.
    #[must_use]
    pub fn zero(status: DownloadStatus) -> Self {
        Self {
            status,
            percent: 0.0,
            speed: String::new(),
            eta: String::new(),
        }
    }
}
