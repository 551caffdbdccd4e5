use std::ops::Range;

use crate::types::PatchBlock;

pub const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
pub const DIVIDER_MARKER: &str = "=======";
pub const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

/// Cheap routing check: does `text` carry all three markers at all?
pub fn contains_diff_markers(text: &str) -> bool {
    text.contains(SEARCH_MARKER) && text.contains(DIVIDER_MARKER) && text.contains(REPLACE_MARKER)
}

/// Parse every well-formed triplet in source order.
///
/// Scanning stops at the first malformed triplet (missing divider or missing
/// end marker); blocks before it are still returned.
pub fn parse_patch_blocks(text: &str) -> Vec<PatchBlock> {
    scan_triplets(text)
        .into_iter()
        .map(|triplet| {
            PatchBlock::new(
                text[triplet.search.clone()].trim(),
                text[triplet.replace.clone()].trim(),
            )
        })
        .collect()
}

/// Raw marker-delimited portions of `text`, markers included, without resolving them.
pub fn extract_diff_blocks(text: &str) -> Vec<&str> {
    scan_triplets(text)
        .into_iter()
        .map(|triplet| &text[triplet.whole])
        .collect()
}

#[derive(Debug)]
struct Triplet {
    whole: Range<usize>,
    search: Range<usize>,
    replace: Range<usize>,
}

fn scan_triplets(text: &str) -> Vec<Triplet> {
    let mut triplets = Vec::new();
    let mut cursor = 0usize;

    while let Some(open) = find_marker_line(text, SEARCH_MARKER, cursor) {
        let next_open = find_marker_line(text, SEARCH_MARKER, open.end).map(|m| m.start);

        let Some(divider) = find_marker_line(text, DIVIDER_MARKER, open.end)
            .filter(|divider| next_open.is_none_or(|next| divider.start < next))
        else {
            tracing::debug!(offset = open.start, "patch block is missing its divider");
            break;
        };
        let Some(close) = find_marker_line(text, REPLACE_MARKER, divider.end)
            .filter(|close| next_open.is_none_or(|next| close.start < next))
        else {
            tracing::debug!(offset = open.start, "patch block is missing its end marker");
            break;
        };

        triplets.push(Triplet {
            whole: open.start..close.end,
            search: open.end..divider.start,
            replace: divider.end..close.start,
        });
        cursor = close.end;
    }

    triplets
}

/// Locate `marker` standing alone on a line at or after `from`.
///
/// The returned range starts at the marker and ends after its line break (or
/// at end of input). Trailing spaces and `\r` after the marker are tolerated.
fn find_marker_line(text: &str, marker: &str, from: usize) -> Option<Range<usize>> {
    if from > text.len() {
        return None;
    }
    for (relative, _) in text[from..].match_indices(marker) {
        let start = from + relative;
        let at_line_start = start == 0 || text.as_bytes()[start - 1] == b'\n';
        if !at_line_start {
            continue;
        }

        let after = start + marker.len();
        let rest = &text[after..];
        let line_end = rest.find('\n').map_or(text.len(), |idx| after + idx + 1);
        let tail = &text[after..line_end];
        if tail.trim_end_matches(['\n', '\r', ' ', '\t']).is_empty() {
            return Some(start..line_end);
        }
    }
    None
}
