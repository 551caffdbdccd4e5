//! The regex table that finds candidate code blocks in markdown.
//!
//! Each entry is independent: all of them run against the whole input and
//! their matches may overlap. Every regex exposes the named groups `fence`,
//! `lang` and `code`; all but [`Detector::Structural`] also capture `path`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Filename with an extension, optionally under directories.
const PATH: &str = r"(?P<path>/?(?:[\w@.\-\[\]]+/)*\.?[\w@\-\[\]]+(?:\.[\w\-]+)*\.[A-Za-z0-9]+)";

/// A fenced block whose closing fence sits at the start of a line.
const FENCE: &str = r"(?P<fence>```(?P<lang>[\w+#.\-]*)[^\n]*\n(?P<code>.*?)^[ \t]*```)";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detector {
    /// A line holding just a (possibly decorated) path, then a fence.
    PathHeading,
    /// "create a file `x`" phrasing immediately before a fence.
    CreatePhrase,
    /// "in / for / update `x`" phrasing immediately before a fence.
    TargetPhrase,
    /// A fence whose first line is a comment naming the file.
    InlineComment,
    /// Any fence; the path is inferred from the content.
    Structural,
}

impl Detector {
    /// Whether the file path comes from text outside the fence.
    pub fn is_explicit(self) -> bool {
        matches!(
            self,
            Detector::PathHeading | Detector::CreatePhrase | Detector::TargetPhrase
        )
    }
}

pub(crate) static DETECTORS: Lazy<Vec<(Detector, Regex)>> = Lazy::new(|| {
    let sources = [
        (
            Detector::PathHeading,
            format!(
                r"(?ms)^[ \t]*(?:#{{1,6}}[ \t]*)?(?:(?:\d+\.|[-*])[ \t]+)?(?:\*\*|__)?(?:(?:[Ff]ile(?:name)?|[Pp]ath)[ \t]*:[ \t]*)?`?{PATH}`?(?:\*\*|__)?:?[ \t]*\n(?:[ \t]*\n)*[ \t]*{FENCE}"
            ),
        ),
        (
            Detector::CreatePhrase,
            format!(
                r#"(?msi)\b(?:create|add|make|write)\s+(?:a\s+)?(?:new\s+)?file\s+(?:called\s+|named\s+|at\s+)?[`'"*]*{PATH}[`'"*]*[^\n]*\n(?:[ \t]*\n)*[ \t]*{FENCE}"#
            ),
        ),
        (
            Detector::TargetPhrase,
            format!(
                r#"(?msi)\b(?:in|for|update|updating|modify|edit)\s+(?:the\s+)?(?:file\s+)?[`'"*]*{PATH}[`'"*]*[^\n]*\n(?:[ \t]*\n)*[ \t]*{FENCE}"#
            ),
        ),
        (
            Detector::InlineComment,
            format!(
                r"(?ms)(?P<fence>```(?P<lang>[\w+#.\-]*)[^\n]*\n[ \t]*(?://|#|--|;|<!--|/\*)[ \t]*(?:(?:[Ff]ile(?:name)?|[Pp]ath)[ \t]*:[ \t]*)?{PATH}[ \t]*(?:-->|\*/)?[ \t]*\n(?P<code>.*?)^[ \t]*```)"
            ),
        ),
        (Detector::Structural, format!("(?ms){FENCE}")),
    ];

    sources
        .into_iter()
        .map(|(detector, source)| {
            let regex = Regex::new(&source).expect("valid detector regex");
            (detector, regex)
        })
        .collect()
});

/// "Create a file at X with the following content:" followed by unfenced text.
pub(crate) static PROSE_FILE_OP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"(?i)\b(?:create|write|save)\s+(?:a\s+)?(?:new\s+)?file\s+(?:at\s+|called\s+|named\s+|to\s+)?[`'"]?{PATH}[`'"]?\s+with\s+(?:the\s+)?(?:following\s+)?contents?\s*:?[ \t]*\n?"#
    ))
    .expect("valid prose file-op regex")
});

pub(crate) static INSTRUCTION_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:create|write|save)\b").expect("valid instruction regex")
});

pub(crate) static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid blank line regex"));
