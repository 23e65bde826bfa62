// src/utils/text.rs

//! Text matching helpers shared by the catalog and the filter evaluator.

use unicode_segmentation::UnicodeSegmentation;

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Optional pattern test: `None` and blank patterns match everything.
pub fn pattern_matches(value: &str, pattern: Option<&str>) -> bool {
    match pattern.map(str::trim) {
        None | Some("") => true,
        Some(p) => contains_ci(value, p),
    }
}

/// Grouping key for a movie title: lowercased words joined by single spaces.
///
/// Punctuation and whitespace differences between ingestion sources collapse
/// to the same key.
pub fn title_key(title: &str) -> String {
    title
        .to_lowercase()
        .unicode_words()
        .collect::<Vec<_>>()
        .join(" ")
}
