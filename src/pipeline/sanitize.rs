//! Removal of leaked document markers from generated answers.
//!
//! Prompts carry document and content markers for grounding, and models
//! sometimes echo them back. [`Sanitizer`] strips them with an ordered set
//! of pure passes:
//!
//! 1. [`drop_marker_lines`]: drop every line holding a deny-listed marker
//! 2. [`strip_marker_spans`]: remove marker-to-content spans
//! 3. [`drop_short_lines`]: drop lines of at most one character
//! 4. [`normalize`]: remove `#` runs, drop the lines of at most one
//!    character this leaves behind, then collapse blank lines and spacing
//!
//! If a marker survives all four, the whole answer is replaced by the
//! apology text. The output of a successful pass is a fixed point.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Case-insensitive substrings that mark a line as leaked structure.
pub const DENY_LIST: &[&str] = &[
    "document", "content", "المستند", "المحتوى", "##", "###", "doc", "no:", "رقم:",
];

/// Marker-to-content spans, matched across lines and ignoring case.
static SPAN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)document no:.*?content:",
        r"(?is)document \d+:.*?content:",
        r"(?is)##.*?##",
        r"(?is)###.*?###",
        r"(?is)المستند رقم:.*?المحتوى:",
        r"(?is)المستند \d+:.*?المحتوى:",
        r"(?is)content:.*?:",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static HEADING_MARKS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"#+").ok());
static BLANK_RUNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n{3,}").ok());
static SPACE_RUNS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[^\S\n]{2,}").ok());

fn replace(re: &LazyLock<Option<Regex>>, text: &str, with: &str) -> String {
    re.as_ref()
        .map_or_else(|| text.to_string(), |re| re.replace_all(text, with).into_owned())
}

/// Whether `text` contains any deny-listed marker (case-insensitive).
#[must_use]
pub fn contains_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    DENY_LIST.iter().any(|m| lower.contains(m))
}

/// Drops every line containing a deny-listed marker.
#[must_use]
pub fn drop_marker_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| !contains_marker(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes document-marker spans.
#[must_use]
pub fn strip_marker_spans(text: &str) -> String {
    SPAN_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

/// Drops lines whose trimmed length is at most one character.
#[must_use]
pub fn drop_short_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| line.trim().chars().count() > 1)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Removes `#` runs and the short lines they leave, collapses 3+ newlines
/// and horizontal whitespace runs, trims.
#[must_use]
pub fn normalize(text: &str) -> String {
    let text = replace(&HEADING_MARKS, text, "");
    // Removing `#` can leave residue lines behind.
    let text = drop_short_lines(&text);
    let text = replace(&BLANK_RUNS, &text, "\n\n");
    let text = replace(&SPACE_RUNS, &text, " ");
    text.trim().to_string()
}

/// Share of ASCII letters among all characters.
#[allow(clippy::cast_precision_loss)]
fn latin_ratio(text: &str) -> f64 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let latin = text.chars().filter(char::is_ascii_alphabetic).count();
    latin as f64 / total as f64
}

/// Deterministic answer filter with a fail-safe apology.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitizer {
    apology: String,
    latin_ratio_limit: Option<f64>,
}

impl Sanitizer {
    /// Creates a sanitizer that answers with `apology` when it must give up.
    #[must_use]
    pub fn new(apology: impl Into<String>) -> Self {
        Self {
            apology: apology.into(),
            latin_ratio_limit: None,
        }
    }

    /// Swaps the fallback text, keeping every other setting.
    #[must_use]
    pub fn with_apology(mut self, apology: impl Into<String>) -> Self {
        self.apology = apology.into();
        self
    }

    /// Rejects answers whose share of Latin letters exceeds `limit`.
    #[must_use]
    pub const fn with_latin_ratio_limit(mut self, limit: f64) -> Self {
        self.latin_ratio_limit = Some(limit);
        self
    }

    /// The fallback text.
    #[must_use]
    pub fn apology(&self) -> &str {
        &self.apology
    }

    /// Cleans `text`, or returns `None` if it cannot be made safe.
    #[must_use]
    pub fn clean(&self, text: &str) -> Option<String> {
        let text = drop_marker_lines(text);
        let text = strip_marker_spans(&text);
        let text = drop_short_lines(&text);
        let text = normalize(&text);

        if contains_marker(&text) {
            warn!("answer still contains document markers after sanitizing");
            return None;
        }
        if let Some(limit) = self.latin_ratio_limit {
            let ratio = latin_ratio(&text);
            if ratio > limit {
                debug!(ratio, limit, "answer exceeds latin script limit");
                return None;
            }
        }
        Some(text)
    }

    /// Cleans `text`, substituting the apology when it cannot be made safe.
    #[must_use]
    pub fn sanitize(&self, text: &str) -> String {
        self.clean(text).unwrap_or_else(|| self.apology.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const APOLOGY: &str = "sorry";

    #[test]
    fn test_drops_marker_lines() {
        let raw = "## Document No: 1\nThe institute offers diplomas.\n### Content: x";
        assert_eq!(drop_marker_lines(raw), "The institute offers diplomas.");
    }

    #[test]
    fn test_marker_lines_are_case_insensitive() {
        assert_eq!(drop_marker_lines("DOCUMENT 3\nkeep"), "keep");
        assert_eq!(drop_marker_lines("المستند رقم: 2\nيبقى"), "يبقى");
    }

    #[test]
    fn test_strip_spans_across_lines() {
        assert_eq!(strip_marker_spans("a Document No: 1\nx Content: b"), "a  b");
        assert_eq!(strip_marker_spans("pre ##mid## post"), "pre  post");
    }

    #[test]
    fn test_drop_short_lines() {
        assert_eq!(drop_short_lines("ok line\n.\n \nab"), "ok line\nab");
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize("  first   line\t\tend\n\n\n\nsecond #line  "),
            "first line end\nsecond line"
        );
    }

    #[test]
    fn test_normalize_drops_heading_residue_lines() {
        assert_eq!(normalize("a ### b\n#\nc d"), "a b\nc d");
        assert_eq!(normalize("## x\nkeep this"), "keep this");
        assert_eq!(drop_short_lines(&normalize("## x\nok")), normalize("## x\nok"));
    }

    #[test]
    fn test_with_apology_keeps_latin_limit() {
        let sanitizer = Sanitizer::new(APOLOGY)
            .with_latin_ratio_limit(0.3)
            .with_apology("other");
        assert_eq!(sanitizer.apology(), "other");
        assert_eq!(sanitizer.sanitize("This answer is English."), "other");
    }

    #[test]
    fn test_clean_answer_passes_through() {
        let sanitizer = Sanitizer::new(APOLOGY);
        let answer = "يقدم المعهد برامج الدبلوم.\nمدة البرنامج سنتان.";
        assert_eq!(sanitizer.sanitize(answer), answer);
    }

    #[test]
    fn test_leaked_markers_removed() {
        let sanitizer = Sanitizer::new(APOLOGY);
        let raw = "## المستند رقم: 1\n### المحتوى: نص\n\nالإجابة هي نعم.\n#";
        assert_eq!(sanitizer.sanitize(raw), "الإجابة هي نعم.");
    }

    #[test]
    fn test_marker_revealed_by_normalizing_yields_apology() {
        let sanitizer = Sanitizer::new(APOLOGY);
        assert_eq!(sanitizer.sanitize("see the do#c for details"), APOLOGY);
    }

    #[test]
    fn test_latin_ratio_limit() {
        let sanitizer = Sanitizer::new(APOLOGY).with_latin_ratio_limit(0.3);
        assert_eq!(sanitizer.sanitize("This answer is English."), APOLOGY);
        assert_eq!(sanitizer.sanitize("الإجابة هي نعم"), "الإجابة هي نعم");
        assert_eq!(Sanitizer::new(APOLOGY).sanitize("Plain English."), "Plain English.");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(raw in r"[a-zA-Z#:؀-ۿ \n\t0-9]{0,200}") {
            let sanitizer = Sanitizer::new(APOLOGY);
            let once = sanitizer.sanitize(&raw);
            if once != APOLOGY {
                prop_assert_eq!(sanitizer.sanitize(&once), once.clone());
                prop_assert!(!contains_marker(&once));
            }
        }

        #[test]
        fn prop_output_never_leaks_markers(
            lines in proptest::collection::vec(
                prop_oneof![
                    Just("## Document No: 4".to_string()),
                    Just("### Content: text".to_string()),
                    Just("المستند رقم: 2".to_string()),
                    "[a-z ]{0,30}",
                    "[؀-ۿ ]{0,30}",
                ],
                0..12,
            )
        ) {
            let sanitizer = Sanitizer::new(APOLOGY);
            let out = sanitizer.sanitize(&lines.join("\n"));
            prop_assert!(out == APOLOGY || !contains_marker(&out));
        }
    }
}
