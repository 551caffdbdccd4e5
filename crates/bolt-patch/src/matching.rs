use std::ops::Range;

/// Find the byte span of the unique run of lines in `content` that equals
/// `needle` after whitespace and punctuation normalization.
///
/// Returns `None` when there is no match or more than one.
pub(crate) fn find_unique_line_span(content: &str, needle: &str) -> Option<Range<usize>> {
    let needle: Vec<String> = needle.lines().map(normalize_line).collect();
    if needle.is_empty() {
        return None;
    }

    let mut lines = Vec::new();
    let mut offset = 0usize;
    for raw in content.split_inclusive('\n') {
        let body = raw.trim_end_matches(['\n', '\r']);
        lines.push((offset..offset + body.len(), normalize_line(body)));
        offset += raw.len();
    }
    if needle.len() > lines.len() {
        return None;
    }

    let mut found = None;
    for start in 0..=lines.len() - needle.len() {
        let window = &lines[start..start + needle.len()];
        if window.iter().zip(&needle).all(|((_, line), want)| line == want) {
            if found.is_some() {
                tracing::debug!("whitespace-tolerant match is ambiguous");
                return None;
            }
            found = Some(window[0].0.start..window[needle.len() - 1].0.end);
        }
    }
    found
}

/// Collapse whitespace runs, drop leading/trailing whitespace, and fold
/// typographic quotes and dashes to their ASCII forms.
pub(crate) fn normalize_line(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut pending_space = false;

    for ch in input.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !result.is_empty() {
            result.push(' ');
        }
        pending_space = false;
        result.push(canonical_char(ch));
    }

    result
}

fn canonical_char(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{02BC}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2212}' => '-',
        _ => ch,
    }
}
