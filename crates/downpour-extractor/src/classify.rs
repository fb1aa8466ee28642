//! Classify downloader stderr into error-model sentinels.

use downpour_core::{CoreError, ErrorKind};

/// Map a failed invocation's stderr to a `CoreError`.
///
/// The full stderr is preserved in the error message for diagnostics; the
/// user sees only the short kind-keyed message.
pub fn classify_failure(op: &'static str, stderr: &str, exit_code: Option<i32>) -> CoreError {
    let kind = classify_stderr(stderr);
    let code = match kind {
        ErrorKind::DownloadFailed if looks_like_network(stderr) => Some("ERR_NETWORK"),
        _ => None,
    };

    let detail = format!(
        "downloader exited with {}: {}",
        exit_code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")),
        stderr.trim()
    );
    let err = CoreError::new(kind, op, detail);
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

fn classify_stderr(stderr: &str) -> ErrorKind {
    const UNSUPPORTED: &[&str] = &["Unsupported URL", "is not a valid URL", "No video formats"];
    const AUTH: &[&str] = &[
        "Sign in to confirm",
        "This video is only available for registered users",
        "Private video",
        "members-only",
        "Login required",
        "requested format is not available. Use --cookies",
    ];
    const NOT_FOUND: &[&str] = &["HTTP Error 404", "Video unavailable", "has been removed"];

    if UNSUPPORTED.iter().any(|p| stderr.contains(p)) {
        ErrorKind::UnsupportedPlatform
    } else if AUTH.iter().any(|p| stderr.contains(p)) {
        ErrorKind::AuthRequired
    } else if NOT_FOUND.iter().any(|p| stderr.contains(p)) {
        ErrorKind::NotFound
    } else {
        ErrorKind::DownloadFailed
    }
}

fn looks_like_network(stderr: &str) -> bool {
    const NETWORK: &[&str] = &[
        "Unable to download webpage",
        "Connection refused",
        "Temporary failure in name resolution",
        "timed out",
        "getaddrinfo",
    ];
    NETWORK.iter().any(|p| stderr.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_platform_detected() {
        let err = classify_failure("Extractor.VideoInfo", "ERROR: Unsupported URL: https://x", Some(1));
        assert_eq!(err.kind(), ErrorKind::UnsupportedPlatform);
    }

    #[test]
    fn auth_wall_detected() {
        let err = classify_failure(
            "Extractor.VideoInfo",
            "ERROR: Sign in to confirm your age",
            Some(1),
        );
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
        assert_eq!(err.code(), "ERR_AUTH");
    }

    #[test]
    fn network_failures_carry_network_code() {
        let err = classify_failure(
            "Extractor.Download",
            "ERROR: Unable to download webpage: <urlopen error timed out>",
            Some(1),
        );
        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(err.code(), "ERR_NETWORK");
    }

    #[test]
    fn unknown_stderr_is_download_failed() {
        let err = classify_failure("Extractor.Download", "ERROR: something odd", Some(2));
        assert_eq!(err.kind(), ErrorKind::DownloadFailed);
        assert_eq!(err.code(), "ERR_DOWNLOAD");
    }
}
