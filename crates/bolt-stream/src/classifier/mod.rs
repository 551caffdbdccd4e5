//! Heuristic extraction of files and commands from free-form markdown.
//!
//! [`BlockClassifier::parse`] is called with the full text of a message each
//! time it grows. Every matched substring is hashed, and a hash already seen
//! for that message is never emitted again, so repeated calls only yield new
//! blocks.

mod detectors;
mod infer;
pub mod shell;

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::artifact::normalize_file_content;

pub use detectors::Detector;
use detectors::{BLANK_LINE, DETECTORS, INSTRUCTION_START, PROSE_FILE_OP};
use infer::infer_path;
pub use shell::CommandFamily;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    File,
    Command,
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: String,
    pub kind: BlockKind,
    /// File body, newline-separated commands, or prose.
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// The fence detector that produced the block; `None` for prose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<Detector>,
}

impl ContentBlock {
    fn new(hash: u32, kind: BlockKind, payload: String) -> Self {
        Self {
            id: format!("block-{hash:08x}"),
            kind,
            payload,
            file_path: None,
            language: None,
            detector: None,
        }
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        let lines = match self.kind {
            BlockKind::Command => self.payload.as_str(),
            _ => "",
        };
        lines.lines()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// Also emit the prose between recognized blocks as `Text` blocks.
    pub emit_text_blocks: bool,
}

/// 32-bit rolling string hash (`h = h * 31 + c`, wrapping).
///
/// Used only to deduplicate matches within a message; collisions are
/// possible and make the second block invisible.
pub fn content_hash(text: &str) -> u32 {
    text.chars()
        .fold(0u32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as u32))
}

#[derive(Debug, Default)]
pub struct BlockClassifier {
    options: ClassifierOptions,
    seen: HashMap<String, HashSet<u32>>,
}

impl BlockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ClassifierOptions) -> Self {
        Self {
            options,
            seen: HashMap::new(),
        }
    }

    /// Drop the dedup history for a message. Returns whether it existed.
    pub fn forget(&mut self, message_id: &str) -> bool {
        self.seen.remove(message_id).is_some()
    }

    pub fn tracked_messages(&self) -> usize {
        self.seen.len()
    }

    /// Return the blocks in `text` not yet reported for `message_id`, in
    /// document order. A block whose end is still open is held back.
    pub fn parse(&mut self, message_id: &str, text: &str) -> Vec<ContentBlock> {
        self.classify(message_id, text, false)
    }

    /// Final call for a message: `text` is complete, so blocks that run to
    /// the end of it are reported too. The message's history is dropped.
    pub fn finish(&mut self, message_id: &str, text: &str) -> Vec<ContentBlock> {
        let blocks = self.classify(message_id, text, true);
        self.forget(message_id);
        blocks
    }

    fn classify(&mut self, message_id: &str, text: &str, complete: bool) -> Vec<ContentBlock> {
        let seen = self.seen.entry(message_id.to_string()).or_default();
        let mut found: Vec<(usize, ContentBlock)> = Vec::new();
        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut claimed_fences: HashSet<usize> = HashSet::new();

        for (detector, regex) in DETECTORS.iter() {
            for caps in regex.captures_iter(text) {
                let (Some(whole), Some(fence)) = (caps.get(0), caps.name("fence")) else {
                    continue;
                };
                // Fence-internal detectors only look at fences no explicit
                // path hint has already claimed in this text.
                if !claimed_fences.insert(fence.start()) && !detector.is_explicit() {
                    continue;
                }
                spans.push(whole.range());

                let hash = content_hash(whole.as_str());
                if !seen.insert(hash) {
                    continue;
                }
                let language = caps.name("lang").map_or("", |m| m.as_str());
                let code = caps.name("code").map_or("", |m| m.as_str());
                let path = caps.name("path").map(|m| m.as_str().to_string());
                match build_fenced_block(*detector, hash, language, code, path) {
                    Some(block) => found.push((whole.start(), block)),
                    None => tracing::trace!(?detector, "fenced block discarded"),
                }
            }
        }

        for (start, span, block) in prose_file_ops(text, complete) {
            spans.push(span.clone());
            if seen.insert(content_hash(&text[span])) {
                found.push((start, block));
            }
        }

        if self.options.emit_text_blocks {
            for (start, segment) in prose_segments(text, &mut spans, complete) {
                let hash = content_hash(segment);
                if seen.insert(hash) {
                    found.push((start, ContentBlock::new(hash, BlockKind::Text, segment.trim().to_string())));
                }
            }
        }

        found.sort_by_key(|(start, _)| *start);
        if !found.is_empty() {
            tracing::debug!(message_id, blocks = found.len(), "classified new blocks");
        }
        found.into_iter().map(|(_, block)| block).collect()
    }
}

fn build_fenced_block(
    detector: Detector,
    hash: u32,
    language: &str,
    code: &str,
    path: Option<String>,
) -> Option<ContentBlock> {
    let language_tag = (!language.is_empty()).then(|| language.to_string());

    if shell::is_shell_language(language) {
        if let Some(commands) = shell::extract_commands(code) {
            let mut block = ContentBlock::new(hash, BlockKind::Command, commands.join("\n"));
            block.language = language_tag;
            block.detector = Some(detector);
            return Some(block);
        }
    }

    let path = path.or_else(|| infer_path(language, code))?;
    let payload = normalize_file_content(code);
    if payload.is_empty() {
        return None;
    }
    let mut block = ContentBlock::new(hash, BlockKind::File, payload);
    block.file_path = Some(path);
    block.language = language_tag;
    block.detector = Some(detector);
    Some(block)
}

/// Unfenced "create a file at X with the following content:" instructions.
/// The body runs to the next blank line or the next instruction. Only a
/// `complete` text lets a body run to the end.
fn prose_file_ops(text: &str, complete: bool) -> Vec<(usize, Range<usize>, ContentBlock)> {
    let mut ops = Vec::new();
    for caps in PROSE_FILE_OP.captures_iter(text) {
        let (Some(whole), Some(path)) = (caps.get(0), caps.name("path")) else {
            continue;
        };
        let rest = &text[whole.end()..];
        if rest.trim_start().starts_with("```") {
            continue;
        }
        let mut body_len = rest.len();
        if let Some(blank) = BLANK_LINE.find(rest) {
            body_len = body_len.min(blank.start());
        }
        if let Some(next) = INSTRUCTION_START.find_iter(rest).find(|m| m.start() > 0) {
            body_len = body_len.min(next.start());
        }
        if body_len == rest.len() && !complete {
            continue;
        }
        let body = rest[..body_len].trim();
        if body.is_empty() {
            continue;
        }

        let span = whole.start()..whole.end() + body_len;
        let mut block = ContentBlock::new(
            content_hash(&text[span.clone()]),
            BlockKind::File,
            format!("{body}\n"),
        );
        block.file_path = Some(path.as_str().to_string());
        ops.push((whole.start(), span, block));
    }
    ops
}

/// Non-blank text between matched spans. Text after the last span is left
/// out until `complete`, since it may still be growing.
fn prose_segments<'a>(
    text: &'a str,
    spans: &mut [Range<usize>],
    complete: bool,
) -> Vec<(usize, &'a str)> {
    spans.sort_by_key(|span| span.start);
    let mut segments = Vec::new();
    let mut cursor = 0;
    for span in spans.iter() {
        if span.start > cursor {
            let segment = &text[cursor..span.start];
            if !segment.trim().is_empty() {
                segments.push((cursor, segment));
            }
        }
        cursor = cursor.max(span.end);
    }
    if complete && cursor < text.len() && !text[cursor..].trim().is_empty() {
        segments.push((cursor, &text[cursor..]));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(content_hash(""), 0);
        assert_eq!(content_hash("a"), 97);
        assert_eq!(content_hash("ab"), 97 * 31 + 98);
        // Wraps instead of overflowing.
        let long = "z".repeat(64);
        let _ = content_hash(&long);
    }

    #[test]
    fn explicit_path_wins_over_structural_inference() {
        let text = "`src/App.jsx`\n```jsx\nexport default function App() {\n  return <div />;\n}\n```\n";
        let blocks = BlockClassifier::new().parse("m", text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::File);
        assert_eq!(blocks[0].file_path.as_deref(), Some("src/App.jsx"));
        assert_eq!(blocks[0].detector, Some(Detector::PathHeading));
    }

    #[test]
    fn shell_fence_becomes_command_block() {
        let text = "Run this:\n```bash\nnpm install\nnpm run dev\n```\n";
        let blocks = BlockClassifier::new().parse("m", text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Command);
        assert_eq!(blocks[0].commands().collect::<Vec<_>>(), ["npm install", "npm run dev"]);
    }

    #[test]
    fn shell_script_without_path_is_discarded() {
        let text = "```bash\n#!/bin/bash\nset -e\necho hi\n```\n";
        assert!(BlockClassifier::new().parse("m", text).is_empty());
    }

    #[test]
    fn unrecognized_fence_is_discarded() {
        let text = "```python\nprint('x')\n```\n";
        assert!(BlockClassifier::new().parse("m", text).is_empty());
    }

    #[test]
    fn prose_instruction_yields_file_block() {
        let text = "Create a file at notes/todo.txt with the following content:\nbuy milk\nwalk dog\n\nThat's all.";
        let blocks = BlockClassifier::new().parse("m", text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_path.as_deref(), Some("notes/todo.txt"));
        assert_eq!(blocks[0].payload, "buy milk\nwalk dog\n");
        assert_eq!(blocks[0].detector, None);
    }

    #[test]
    fn unterminated_prose_instruction_waits_for_finish() {
        let text = "Create a file at notes.txt with the following content:\nbuy milk";
        let mut classifier = BlockClassifier::new();
        assert!(classifier.parse("m", text).is_empty());

        let blocks = classifier.finish("m", text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].file_path.as_deref(), Some("notes.txt"));
        assert_eq!(blocks[0].payload, "buy milk\n");
        assert_eq!(classifier.tracked_messages(), 0);
    }

    #[test]
    fn finish_releases_trailing_text() {
        let text = "Intro words.\n\n```css\nbody {}\n```\ntrailing";
        let mut classifier = BlockClassifier::with_options(ClassifierOptions {
            emit_text_blocks: true,
        });
        assert_eq!(classifier.parse("m", text).len(), 2);

        let rest = classifier.finish("m", text);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].kind, BlockKind::Text);
        assert_eq!(rest[0].payload, "trailing");
    }

    #[test]
    fn text_blocks_are_opt_in() {
        let text = "Intro words.\n\n```css\nbody {}\n```\ntrailing";
        let plain = BlockClassifier::new().parse("m", text);
        assert!(plain.iter().all(|b| b.kind != BlockKind::Text));

        let mut classifier = BlockClassifier::with_options(ClassifierOptions {
            emit_text_blocks: true,
        });
        let blocks = classifier.parse("m", text);
        assert_eq!(blocks[0].kind, BlockKind::Text);
        assert_eq!(blocks[0].payload, "Intro words.");
        assert_eq!(blocks[1].file_path.as_deref(), Some("/styles.css"));
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn messages_are_deduplicated_independently() {
        let text = "```css\nbody {}\n```\n";
        let mut classifier = BlockClassifier::new();
        assert_eq!(classifier.parse("a", text).len(), 1);
        assert_eq!(classifier.parse("a", text).len(), 0);
        assert_eq!(classifier.parse("b", text).len(), 1);
        assert_eq!(classifier.tracked_messages(), 2);
        assert!(classifier.forget("a"));
        assert_eq!(classifier.parse("a", text).len(), 1);
    }
}
