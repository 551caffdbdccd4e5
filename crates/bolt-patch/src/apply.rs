use crate::matching::find_unique_line_span;
use crate::parser::parse_patch_blocks;
use crate::types::{DiffResult, LineRange, PatchBlock, PatchOptions};

/// Apply every SEARCH/REPLACE triplet in `patch_text` to `original`.
pub fn apply_diff_patches(original: &str, patch_text: &str) -> DiffResult {
    apply_diff_patches_with(original, patch_text, PatchOptions::default())
}

pub fn apply_diff_patches_with(
    original: &str,
    patch_text: &str,
    options: PatchOptions,
) -> DiffResult {
    let blocks = parse_patch_blocks(patch_text);
    if blocks.is_empty() {
        return DiffResult::unchanged(original);
    }
    apply_blocks(original, &blocks, options)
}

/// Apply already-parsed blocks sequentially against the mutating content.
pub fn apply_blocks(original: &str, blocks: &[PatchBlock], options: PatchOptions) -> DiffResult {
    let mut content = original.to_string();
    let mut touched: Vec<LineRange> = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        let replace_lines = line_count(&block.replace);

        if block.is_insertion() {
            // An empty replace still inserts the separating newline.
            content = format!("{}\n{}", block.replace, content);
            touched.push((1, end_line(1, replace_lines)));
            continue;
        }

        let span = match content.find(&block.search) {
            Some(offset) => Some(offset..offset + block.search.len()),
            None if options.fuzzy_whitespace => find_unique_line_span(&content, &block.search),
            None => None,
        };
        let Some(span) = span else {
            tracing::debug!(block = index, "search text not found; skipping block");
            continue;
        };

        let start_line = content[..span.start].matches('\n').count() + 1;
        content.replace_range(span, &block.replace);
        touched.push((start_line, end_line(start_line, replace_lines)));
    }

    let has_changes = !touched.is_empty();
    DiffResult {
        modified_content: content,
        touched_line_ranges: touched,
        has_changes,
    }
}

fn line_count(text: &str) -> usize {
    text.lines().count()
}

fn end_line(start: usize, replace_lines: usize) -> usize {
    if replace_lines == 0 {
        start
    } else {
        start + replace_lines - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triplet(search: &str, replace: &str) -> String {
        format!("<<<<<<< SEARCH\n{search}\n=======\n{replace}\n>>>>>>> REPLACE\n")
    }

    #[test]
    fn replaces_first_occurrence_and_reports_range() {
        let result = apply_diff_patches("foo\nbaz", &triplet("foo", "bar"));
        assert_eq!(result.modified_content, "bar\nbaz");
        assert_eq!(result.touched_line_ranges, vec![(1, 1)]);
        assert!(result.has_changes);
    }

    #[test]
    fn empty_search_prepends_replace_text() {
        let result = apply_diff_patches("existing", &triplet("", "line1\nline2"));
        assert_eq!(result.modified_content, "line1\nline2\nexisting");
        assert_eq!(result.touched_line_ranges, vec![(1, 2)]);
        assert!(result.has_changes);
    }

    #[test]
    fn empty_insertion_adds_a_blank_first_line() {
        let result = apply_diff_patches("existing", &triplet("", ""));
        assert_eq!(result.modified_content, "\nexisting");
        assert_eq!(result.touched_line_ranges, vec![(1, 1)]);
        assert!(result.has_changes);
    }

    #[test]
    fn no_valid_triplets_returns_original() {
        let result = apply_diff_patches("keep me", "no markers here");
        assert_eq!(result.modified_content, "keep me");
        assert!(result.touched_line_ranges.is_empty());
        assert!(!result.has_changes);
    }

    #[test]
    fn missing_search_text_is_skipped() {
        let patch = format!("{}{}", triplet("absent", "x"), triplet("b", "B"));
        let result = apply_diff_patches("a\nb\nc", &patch);
        assert_eq!(result.modified_content, "a\nB\nc");
        assert_eq!(result.touched_line_ranges, vec![(2, 2)]);
        assert!(result.has_changes);
    }

    #[test]
    fn later_blocks_see_earlier_edits() {
        let patch = format!("{}{}", triplet("alpha", "beta"), triplet("beta", "gamma"));
        let result = apply_diff_patches("alpha", &patch);
        assert_eq!(result.modified_content, "gamma");
        assert_eq!(result.touched_line_ranges, vec![(1, 1), (1, 1)]);
    }

    #[test]
    fn multi_line_replacement_extends_range() {
        let original = "one\ntwo\nthree\n";
        let result = apply_diff_patches(original, &triplet("two", "2a\n2b\n2c"));
        assert_eq!(result.modified_content, "one\n2a\n2b\n2c\nthree\n");
        assert_eq!(result.touched_line_ranges, vec![(2, 4)]);
    }

    #[test]
    fn deletion_collapses_range_to_start_line() {
        let result = apply_diff_patches("a\nb\nc", &triplet("b\n", ""));
        assert_eq!(result.touched_line_ranges, vec![(2, 2)]);
    }

    #[test]
    fn malformed_tail_preserves_applied_blocks() {
        let patch = format!("{}<<<<<<< SEARCH\nc\n=======\nC\n", triplet("a", "A"));
        let result = apply_diff_patches("a\nb\nc", &patch);
        assert_eq!(result.modified_content, "A\nb\nc");
        assert!(result.has_changes);
    }

    #[test]
    fn fuzzy_matching_is_opt_in() {
        let original = "fn main() {\n    let  x = 1;\n}\n";
        let patch = triplet("let x = 1;", "let x = 2;");

        let strict = apply_diff_patches(original, &patch);
        assert!(!strict.has_changes);
        assert_eq!(strict.modified_content, original);

        let fuzzy = apply_diff_patches_with(
            original,
            &patch,
            PatchOptions {
                fuzzy_whitespace: true,
            },
        );
        assert!(fuzzy.has_changes);
        assert_eq!(fuzzy.modified_content, "fn main() {\nlet x = 2;\n}\n");
        assert_eq!(fuzzy.touched_line_ranges, vec![(2, 2)]);
    }
}
