//! Deterministic output-path policy.

use std::path::{Path, PathBuf};

/// Output path for a format conversion: same directory and stem, new
/// extension. When that would overwrite the input (same extension), a
/// `_converted` suffix is added.
#[must_use]
pub fn converted_output_path(input: &Path, extension: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let candidate = input.with_file_name(format!("{stem}.{extension}"));
    if candidate == input {
        input.with_file_name(format!("{stem}_converted.{extension}"))
    } else {
        candidate
    }
}

/// Output path for in-place compression: `_compressed` suffix, keeping
/// the extension. If the target already exists, a timestamp is appended
/// so nothing is overwritten.
#[must_use]
pub fn compressed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();

    let with_ext = |name: String| {
        if extension.is_empty() {
            input.with_file_name(name)
        } else {
            input.with_file_name(format!("{name}.{extension}"))
        }
    };

    let candidate = with_ext(format!("{stem}_compressed"));
    if !candidate.exists() {
        return candidate;
    }
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S");
    with_ext(format!("{stem}_compressed_{timestamp}"))
}
