//! Curated whisper.cpp model catalog.
//!
//! GGML files from the upstream whisper.cpp release repository. Sizes are
//! approximate and used for progress display only.

use downpour_core::WhisperModelInfo;

const BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

struct CatalogEntry {
    name: &'static str,
    size_bytes: u64,
    size_display: &'static str,
    english_only: bool,
    is_default: bool,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "tiny",
        size_bytes: 77_700_000,
        size_display: "75 MiB",
        english_only: false,
        is_default: false,
    },
    CatalogEntry {
        name: "tiny.en",
        size_bytes: 77_700_000,
        size_display: "75 MiB",
        english_only: true,
        is_default: false,
    },
    CatalogEntry {
        name: "base",
        size_bytes: 147_900_000,
        size_display: "142 MiB",
        english_only: false,
        is_default: true,
    },
    CatalogEntry {
        name: "base.en",
        size_bytes: 147_900_000,
        size_display: "142 MiB",
        english_only: true,
        is_default: false,
    },
    CatalogEntry {
        name: "small",
        size_bytes: 487_600_000,
        size_display: "466 MiB",
        english_only: false,
        is_default: false,
    },
    CatalogEntry {
        name: "medium",
        size_bytes: 1_533_000_000,
        size_display: "1.5 GiB",
        english_only: false,
        is_default: false,
    },
    CatalogEntry {
        name: "large-v3",
        size_bytes: 3_095_000_000,
        size_display: "2.9 GiB",
        english_only: false,
        is_default: false,
    },
];

/// The full model catalog, installation state unset.
#[must_use]
pub fn catalog() -> Vec<WhisperModelInfo> {
    CATALOG
        .iter()
        .map(|entry| WhisperModelInfo {
            name: entry.name.to_string(),
            filename: format!("ggml-{}.bin", entry.name),
            url: format!("{BASE_URL}/ggml-{}.bin", entry.name),
            size_bytes: entry.size_bytes,
            size_display: entry.size_display.to_string(),
            english_only: entry.english_only,
            is_default: entry.is_default,
            installed: false,
        })
        .collect()
}

/// Look up one catalog entry by model name.
#[must_use]
pub fn find(name: &str) -> Option<WhisperModelInfo> {
    catalog().into_iter().find(|m| m.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_exactly_one_default() {
        assert_eq!(catalog().iter().filter(|m| m.is_default).count(), 1);
    }

    #[test]
    fn filenames_follow_the_ggml_convention() {
        for model in catalog() {
            assert_eq!(model.filename, format!("ggml-{}.bin", model.name));
            assert!(model.url.ends_with(&model.filename));
        }
    }

    #[test]
    fn find_is_by_exact_name() {
        assert!(find("base.en").is_some());
        assert!(find("enormous").is_none());
    }
}
