use serde::{Deserialize, Serialize};

/// Inclusive, 1-based `(start_line, end_line)` pair. Serializes as `[start, end]`.
pub type LineRange = (usize, usize);

/// One SEARCH/REPLACE instruction, with both sides already trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBlock {
    pub search: String,
    pub replace: String,
}

impl PatchBlock {
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }

    /// An empty search side means "insert at the very top".
    pub fn is_insertion(&self) -> bool {
        self.search.is_empty()
    }
}

/// Outcome of applying a patch to a known original.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub modified_content: String,
    pub touched_line_ranges: Vec<LineRange>,
    pub has_changes: bool,
}

impl DiffResult {
    pub(crate) fn unchanged(original: &str) -> Self {
        Self {
            modified_content: original.to_string(),
            touched_line_ranges: Vec::new(),
            has_changes: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchOptions {
    /// When the literal search fails, retry with a unique line-level match
    /// that ignores whitespace differences and typographic punctuation.
    pub fuzzy_whitespace: bool,
}
