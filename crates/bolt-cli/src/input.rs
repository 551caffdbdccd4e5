//! Reading inputs and slicing them into simulated stream updates.

use std::io::Read;

use anyhow::{Context, Result};

/// Read a file, or stdin when `source` is `-`.
pub fn read_input(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read file: {source}"))
    }
}

/// Growing prefixes of `text`, each about `chunk_size` bytes longer than
/// the last and ending on a char boundary. The last prefix is `text`.
pub fn prefixes(text: &str, chunk_size: usize) -> Vec<&str> {
    if chunk_size == 0 {
        return vec![text];
    }
    let mut out = Vec::new();
    let mut end = 0;
    while end < text.len() {
        end = (end + chunk_size).min(text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        out.push(&text[..end]);
    }
    if out.is_empty() {
        out.push(text);
    }
    out
}
