//! Progress-line parsing.
//!
//! The downloader binary emits one status line per refresh (`--newline`).
//! Lines are matched against a fixed pattern set; anything that doesn't
//! match is forwarded to the log callback only and never fails the
//! download.

use once_cell::sync::Lazy;
use regex::Regex;

use downpour_core::{DownloadProgress, DownloadStatus};

static DOWNLOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[download\]\s+(?P<percent>\d{1,3}(?:\.\d+)?)%(?:\s+of\s+~?\s*\S+)?(?:\s+at\s+(?P<speed>\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
    )
    .expect("valid regex")
});

static ALREADY_DOWNLOADED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[download\]\s+.+ has already been downloaded").expect("valid regex")
});

/// Post-processing lines marking the download→merge phase boundary.
static MERGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[(?:Merger|ExtractAudio|VideoRemuxer|VideoConvertor|FixupM3u8)\]")
        .expect("valid regex")
});

/// Parse one output line into a progress observation.
///
/// Percent is monotonic within a phase; the `merging` observation resets
/// it to 0 so consumers can reset their view at the boundary.
#[must_use]
pub fn parse_progress(line: &str) -> Option<DownloadProgress> {
    if MERGE_RE.is_match(line) {
        return Some(DownloadProgress::zero(DownloadStatus::Merging));
    }

    if ALREADY_DOWNLOADED_RE.is_match(line) {
        return Some(DownloadProgress {
            status: DownloadStatus::Downloading,
            percent: 100.0,
            speed: String::new(),
            eta: String::new(),
        });
    }

    let captures = DOWNLOAD_RE.captures(line)?;
    let percent = captures
        .name("percent")?
        .as_str()
        .parse::<f64>()
        .ok()?
        .clamp(0.0, 100.0);

    Some(DownloadProgress {
        status: DownloadStatus::Downloading,
        percent,
        speed: captures
            .name("speed")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        eta: captures
            .name("eta")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
    })
}
