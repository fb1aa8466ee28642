//! Deterministic argument assembly for the downloader binary.
//!
//! Everything the child receives is built here from validated options, in
//! a fixed order, so invocations are reproducible and testable.

use std::path::Path;

use downpour_core::DownloadOptions;

/// Default format selector: best video+audio, merged.
const DEFAULT_FORMAT: &str = "bestvideo*+bestaudio/best";

/// Default audio container for audio-only downloads.
const DEFAULT_AUDIO_FORMAT: &str = "mp3";

/// Build the argument vector for a download invocation.
///
/// Order: behavior flags, output template, format selection, cookies,
/// accelerator, trim, then the URL last.
pub fn download_args(
    options: &DownloadOptions,
    output_dir: &Path,
    aria2c_path: Option<&Path>,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--progress".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
    ];

    args.push("--output".into());
    args.push(
        output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .into_owned(),
    );

    if options.audio_only {
        args.push("--extract-audio".into());
        args.push("--audio-format".into());
        args.push(
            options
                .audio_format
                .clone()
                .unwrap_or_else(|| DEFAULT_AUDIO_FORMAT.to_string()),
        );
        args.push("--audio-quality".into());
        args.push(options.audio_quality.clone().unwrap_or_else(|| "0".to_string()));
        args.push("--format".into());
        args.push("bestaudio/best".into());
    } else {
        args.push("--format".into());
        args.push(
            options
                .format
                .clone()
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        );
    }

    if let Some(browser) = options
        .cookies_from_browser
        .as_ref()
        .filter(|b| !b.is_empty())
    {
        args.push("--cookies-from-browser".into());
        args.push(browser.clone());
    }

    if options.accelerator_enabled {
        if let Some(aria2c) = aria2c_path {
            let connections = options.effective_connections();
            args.push("--downloader".into());
            args.push(aria2c.to_string_lossy().into_owned());
            args.push("--downloader-args".into());
            args.push(format!("aria2c:-x{connections} -s{connections}"));
        }
    }

    if let Some(trim) = options.trim.filter(|t| t.is_valid()) {
        args.push("--download-sections".into());
        args.push(format!("*{}-{}", trim.start_secs, trim.end_secs));
        // Re-encoding at cut points keeps trims frame-accurate.
        args.push("--force-keyframes-at-cuts".into());
    }

    args.push(options.url.clone());
    args
}

/// Arguments for the metadata-only probe.
pub fn info_args(url: &str) -> Vec<String> {
    vec![
        "--dump-single-json".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        url.to_string(),
    ]
}

/// Arguments for resolving the direct media URL of one format.
pub fn stream_url_args(url: &str, format: &str) -> Vec<String> {
    vec![
        "--get-url".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--format".into(),
        format.to_string(),
        url.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use downpour_core::TrimRange;
    use std::path::PathBuf;

    fn options() -> DownloadOptions {
        DownloadOptions::for_url("https://example.test/watch?v=1")
    }

    #[test]
    fn url_is_always_last() {
        let args = download_args(&options(), Path::new("/media"), None);
        assert_eq!(args.last().unwrap(), "https://example.test/watch?v=1");
    }

    #[test]
    fn default_format_is_best_merged() {
        let args = download_args(&options(), Path::new("/media"), None);
        let idx = args.iter().position(|a| a == "--format").unwrap();
        assert_eq!(args[idx + 1], "bestvideo*+bestaudio/best");
    }

    #[test]
    fn audio_only_extracts_audio() {
        let mut opts = options();
        opts.audio_only = true;
        opts.audio_format = Some("m4a".to_string());
        let args = download_args(&opts, Path::new("/media"), None);
        assert!(args.contains(&"--extract-audio".to_string()));
        let idx = args.iter().position(|a| a == "--audio-format").unwrap();
        assert_eq!(args[idx + 1], "m4a");
    }

    #[test]
    fn accelerator_requires_binary() {
        let mut opts = options();
        opts.accelerator_enabled = true;
        opts.accelerator_connections = 8;

        let without = download_args(&opts, Path::new("/media"), None);
        assert!(!without.iter().any(|a| a == "--downloader"));

        let with = download_args(&opts, Path::new("/media"), Some(&PathBuf::from("/bin/aria2c")));
        let idx = with.iter().position(|a| a == "--downloader-args").unwrap();
        assert_eq!(with[idx + 1], "aria2c:-x8 -s8");
    }

    #[test]
    fn trim_adds_download_sections() {
        let mut opts = options();
        opts.trim = Some(TrimRange { start_secs: 5.0, end_secs: 20.0 });
        let args = download_args(&opts, Path::new("/media"), None);
        let idx = args.iter().position(|a| a == "--download-sections").unwrap();
        assert_eq!(args[idx + 1], "*5-20");
        assert!(args.contains(&"--force-keyframes-at-cuts".to_string()));
    }

    #[test]
    fn invalid_trim_is_ignored() {
        let mut opts = options();
        opts.trim = Some(TrimRange { start_secs: 20.0, end_secs: 5.0 });
        let args = download_args(&opts, Path::new("/media"), None);
        assert!(!args.iter().any(|a| a == "--download-sections"));
    }

    #[test]
    fn cookies_flag_forwards_browser() {
        let mut opts = options();
        opts.cookies_from_browser = Some("firefox".to_string());
        let args = download_args(&opts, Path::new("/media"), None);
        let idx = args.iter().position(|a| a == "--cookies-from-browser").unwrap();
        assert_eq!(args[idx + 1], "firefox");
    }
}
