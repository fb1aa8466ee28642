//! Input validation guards invoked at every public entry point.
//!
//! Handlers call these before anything reaches the core. Failures surface
//! with the matching sentinel kind and are wrapped by the caller with its
//! operation name.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{CoreError, CoreResult, ErrorKind};

/// Maximum displayable filename length in bytes.
const MAX_FILENAME_BYTES: usize = 100;

/// Characters forbidden in filenames on at least one supported OS.
const FORBIDDEN_FILENAME_CHARS: &[char] =
    &['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Validate a media URL: must parse, scheme http/https, non-empty host.
pub fn validate_url(raw: &str) -> CoreResult<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::invalid_url("validate.url", raw));
    }
    let parsed =
        Url::parse(trimmed).map_err(|_| CoreError::invalid_url("validate.url", trimmed))?;
    match parsed.scheme() {
        "http" | "https" => {}
        _ => return Err(CoreError::invalid_url("validate.url", trimmed)),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(CoreError::invalid_url("validate.url", trimmed));
    }
    Ok(parsed)
}

/// Resolve `candidate` against `root` and reject path traversal.
///
/// Relative paths are joined to `root`; `..` segments are collapsed
/// lexically and the result must remain under `root`.
pub fn validate_path_within(root: &Path, candidate: &Path) -> CoreResult<PathBuf> {
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let normalized = normalize(&joined);
    let root_normalized = normalize(root);

    if !normalized.starts_with(&root_normalized) {
        return Err(CoreError::new(
            ErrorKind::PermissionDenied,
            "validate.path",
            format!("path escapes data directory: {}", candidate.display()),
        ));
    }
    Ok(normalized)
}

/// Lexical normalization: collapse `.` and `..` without touching the
/// filesystem, so validation works for paths that do not exist yet.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Strip OS-forbidden characters and cap the result at 100 bytes of
/// displayable text (on a char boundary). Blank results fall back to
/// `"download"`.
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let mut cleaned = filtered.trim().trim_matches('.').to_string();

    if cleaned.is_empty() {
        return "download".to_string();
    }

    if cleaned.len() <= MAX_FILENAME_BYTES {
        return cleaned;
    }
    let mut cut = MAX_FILENAME_BYTES;
    while !cleaned.is_char_boundary(cut) {
        cut -= 1;
    }
    cleaned.truncate(cut);
    cleaned
}

/// Return `value` trimmed, or `default` when blank.
#[must_use]
pub fn non_empty_or(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Return `value` when positive, else `default`; `cap` bounds the result.
#[must_use]
pub fn positive_or(value: i64, default: u32, cap: Option<u32>) -> u32 {
    let chosen = if value > 0 {
        u32::try_from(value).unwrap_or(u32::MAX)
    } else {
        default
    };
    match cap {
        Some(max) => chosen.min(max),
        None => chosen,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https_urls() {
        assert!(validate_url("https://example.test/watch?v=1").is_ok());
        assert!(validate_url("http://example.test/a").is_ok());
    }

    #[test]
    fn rejects_bad_urls() {
        for bad in ["", "   ", "ftp://example.test/a", "file:///etc/passwd", "not a url"] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "input: {bad:?}");
        }
    }

    #[test]
    fn path_traversal_is_rejected() {
        let root = Path::new("/data/downpour");
        let err = validate_path_within(root, Path::new("../../etc/passwd")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn relative_paths_resolve_under_root() {
        let root = Path::new("/data/downpour");
        let ok = validate_path_within(root, Path::new("videos/clip.mp4")).unwrap();
        assert_eq!(ok, PathBuf::from("/data/downpour/videos/clip.mp4"));
    }

    #[test]
    fn dotdot_inside_root_is_collapsed() {
        let root = Path::new("/data/downpour");
        let ok = validate_path_within(root, Path::new("videos/../images/a.png")).unwrap();
        assert_eq!(ok, PathBuf::from("/data/downpour/images/a.png"));
    }

    #[test]
    fn filenames_lose_forbidden_characters() {
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "abcdefghij");
        assert_eq!(sanitize_filename("  .hidden.  "), "hidden");
        assert_eq!(sanitize_filename("///"), "download");
    }

    #[test]
    fn filenames_cap_on_char_boundary() {
        let long = "ü".repeat(80); // 160 bytes
        let sanitized = sanitize_filename(&long);
        assert!(sanitized.len() <= 100);
        assert!(sanitized.is_char_boundary(sanitized.len()));
    }

    #[test]
    fn defaults_for_blank_and_nonpositive() {
        assert_eq!(non_empty_or("  ", "fallback"), "fallback");
        assert_eq!(non_empty_or(" x ", "fallback"), "x");
        assert_eq!(positive_or(0, 16, Some(32)), 16);
        assert_eq!(positive_or(-3, 16, None), 16);
        assert_eq!(positive_or(64, 16, Some(32)), 32);
        assert_eq!(positive_or(8, 16, Some(32)), 8);
    }
}
