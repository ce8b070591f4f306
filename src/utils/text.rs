//! Normalization of raw text extracted from full-text documents.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

// Punctuation glued to the next word ("end.Next"); decimals such as 3.14 are left alone
static MISSING_SPACE_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.,!?;])(\p{L})").unwrap());

static SPACE_BEFORE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+([.,!?;])").unwrap());

/// UTF-8 sequences that were decoded as Latin-1 upstream
const MOJIBAKE: &[(&str, &str)] = &[
    ("â\u{80}\u{93}", "-"),
    ("â\u{80}\u{94}", "-"),
    ("â\u{80}\u{99}", "'"),
    ("â\u{80}\u{9c}", "\""),
    ("â\u{80}\u{9d}", "\""),
    ("Â", ""),
];

/// Clean a passage of section text.
///
/// Repairs common encoding artifacts, folds newlines and runs of whitespace
/// into single spaces, puts exactly one space after sentence punctuation
/// and none before it.
pub fn clean_section_text(raw: &str) -> String {
    let mut text = raw.to_string();
    for (broken, fixed) in MOJIBAKE {
        if text.contains(broken) {
            text = text.replace(broken, fixed);
        }
    }

    let text = WHITESPACE.replace_all(&text, " ");
    let text = SPACE_BEFORE.replace_all(&text, "$1");
    let text = MISSING_SPACE_AFTER.replace_all(&text, "$1 $2");
    text.trim().to_string()
}
