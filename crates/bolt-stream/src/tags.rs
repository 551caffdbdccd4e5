//! Incremental `<boltArtifact>` / `<boltAction>` recognizer.
//!
//! Callers hand in the *entire* text received so far for a message on every
//! call. Each session remembers how far it has consumed, so repeated calls
//! only scan the new suffix. A tag that is cut off at the end of the buffer
//! is held back until more text arrives.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::artifact::{Action, ActionKind, Artifact};
use crate::observer::ParserObserver;

const ARTIFACT_OPEN: &str = "<boltArtifact";
const ARTIFACT_CLOSE: &str = "</boltArtifact>";
const ACTION_OPEN: &str = "<boltAction";
const ACTION_CLOSE: &str = "</boltAction>";

static ATTRIBUTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([A-Za-z_][\w-]*)\s*=\s*"([^"]*)""#).expect("valid attribute regex"));

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    ArtifactOpen,
    ArtifactClose,
    ActionOpen,
    ActionClose,
}

impl Tag {
    fn literal(self) -> &'static str {
        match self {
            Tag::ArtifactOpen => ARTIFACT_OPEN,
            Tag::ArtifactClose => ARTIFACT_CLOSE,
            Tag::ActionOpen => ACTION_OPEN,
            Tag::ActionClose => ACTION_CLOSE,
        }
    }

    fn carries_attributes(self) -> bool {
        matches!(self, Tag::ArtifactOpen | Tag::ActionOpen)
    }
}

const OUTSIDE_ARTIFACT: &[Tag] = &[Tag::ArtifactOpen, Tag::ArtifactClose];
const INSIDE_ARTIFACT: &[Tag] = &[
    Tag::ArtifactClose,
    Tag::ActionOpen,
    Tag::ActionClose,
    Tag::ArtifactOpen,
];

enum Scan<'a> {
    Found {
        start: usize,
        end: usize,
        tag: Tag,
        raw: &'a str,
    },
    /// A tag may begin at `start` but the buffer ends before it is complete.
    Partial { start: usize },
    Nothing,
}

fn scan_tags<'a>(rest: &'a str, wanted: &[Tag]) -> Scan<'a> {
    for (start, _) in rest.match_indices('<') {
        let tail = &rest[start..];
        for &tag in wanted {
            let literal = tag.literal();
            if tail.len() < literal.len() {
                if literal.starts_with(tail) {
                    return Scan::Partial { start };
                }
                continue;
            }
            if !tail.starts_with(literal) {
                continue;
            }
            if !tag.carries_attributes() {
                return Scan::Found {
                    start,
                    end: start + literal.len(),
                    tag,
                    raw: &tail[..literal.len()],
                };
            }
            match tail[literal.len()..].chars().next() {
                Some(c) if c == '>' || c.is_whitespace() => match tail.find('>') {
                    Some(gt) => {
                        return Scan::Found {
                            start,
                            end: start + gt + 1,
                            tag,
                            raw: &tail[..=gt],
                        };
                    }
                    None => return Scan::Partial { start },
                },
                None => return Scan::Partial { start },
                // `<boltArtifactFoo` is some other element.
                Some(_) => continue,
            }
        }
    }
    Scan::Nothing
}

/// Length of the longest suffix of `text` that is a proper prefix of `tag`.
fn partial_suffix_len(text: &str, tag: &str) -> usize {
    (1..tag.len())
        .rev()
        .find(|&k| text.ends_with(&tag[..k]))
        .unwrap_or(0)
}

fn attribute(raw: &str, name: &str) -> Option<String> {
    ATTRIBUTE_RE
        .captures_iter(raw)
        .find(|caps| &caps[1] == name)
        .map(|caps| caps[2].to_string())
}

#[derive(Debug)]
enum OpenAction {
    Tracked(Action),
    /// An action of an unrecognized type; its body is consumed silently.
    Skipped,
}

/// Per-message parse state.
#[derive(Debug, Default)]
pub struct ParserSession {
    cursor: usize,
    open_artifact: Option<Artifact>,
    open_action: Option<OpenAction>,
    action_counter: u64,
}

impl ParserSession {
    /// Byte offset up to which the message text has been consumed.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn open_artifact(&self) -> Option<&Artifact> {
        self.open_artifact.as_ref()
    }

    pub fn in_action(&self) -> bool {
        self.open_action.is_some()
    }

    fn advance<O: ParserObserver + ?Sized>(
        &mut self,
        message_id: &str,
        text: &str,
        observer: &mut O,
    ) -> String {
        let mut prose = String::new();
        if text.len() < self.cursor || !text.is_char_boundary(self.cursor) {
            tracing::warn!(
                message_id,
                cursor = self.cursor,
                len = text.len(),
                "message text is not an extension of what was already parsed; ignoring"
            );
            return prose;
        }

        let mut index = self.cursor;
        while index < text.len() {
            let rest = &text[index..];

            if self.open_action.is_some() {
                let (chunk_len, closed) = match rest.find(ACTION_CLOSE) {
                    Some(pos) => (pos, true),
                    None => (rest.len() - partial_suffix_len(rest, ACTION_CLOSE), false),
                };
                self.append_to_action(message_id, &rest[..chunk_len], observer);
                index += chunk_len;
                if !closed {
                    break;
                }
                index += ACTION_CLOSE.len();
                self.close_action(message_id, observer);
                continue;
            }

            let outside = self.open_artifact.is_none();
            let wanted = if outside { OUTSIDE_ARTIFACT } else { INSIDE_ARTIFACT };
            match scan_tags(rest, wanted) {
                Scan::Nothing => {
                    if outside {
                        prose.push_str(rest);
                    }
                    index = text.len();
                }
                Scan::Partial { start } => {
                    if outside {
                        prose.push_str(&rest[..start]);
                    }
                    index += start;
                    break;
                }
                Scan::Found {
                    start,
                    end,
                    tag,
                    raw,
                } => {
                    if outside {
                        prose.push_str(&rest[..start]);
                    }
                    self.handle_tag(message_id, tag, raw, observer);
                    index += end;
                }
            }
        }

        self.cursor = index;
        prose
    }

    fn handle_tag<O: ParserObserver + ?Sized>(
        &mut self,
        message_id: &str,
        tag: Tag,
        raw: &str,
        observer: &mut O,
    ) {
        match tag {
            Tag::ArtifactOpen => {
                let id = attribute(raw, "id").unwrap_or_default();
                let title = attribute(raw, "title").unwrap_or_default();
                if id.is_empty() {
                    tracing::warn!(message_id, "artifact opened without an id");
                }
                if let Some(previous) = self.open_artifact.take() {
                    tracing::warn!(
                        message_id,
                        previous = %previous.id,
                        next = %id,
                        "nested artifact replaces the open one"
                    );
                }
                let artifact = Artifact::new(id, title);
                observer.on_artifact_open(message_id, &artifact);
                self.open_artifact = Some(artifact);
            }
            Tag::ArtifactClose => match self.open_artifact.take() {
                Some(artifact) => {
                    tracing::debug!(message_id, artifact_id = %artifact.id, actions = artifact.actions.len(), "artifact complete");
                    observer.on_artifact_complete(message_id, artifact);
                }
                None => tracing::debug!(message_id, "ignoring stray artifact close tag"),
            },
            Tag::ActionOpen => {
                let Some(artifact) = self.open_artifact.as_ref() else {
                    return;
                };
                let kind_attr = attribute(raw, "type").unwrap_or_default();
                match ActionKind::from_attr(&kind_attr) {
                    Some(kind) => {
                        self.action_counter += 1;
                        let file_path = match kind {
                            ActionKind::File => attribute(raw, "filePath"),
                            ActionKind::Shell => None,
                        };
                        if kind == ActionKind::File && file_path.is_none() {
                            tracing::warn!(message_id, "file action without a filePath");
                        }
                        let action = Action::new(self.action_counter.to_string(), kind, file_path);
                        observer.on_action_open(message_id, &artifact.id, &action);
                        self.open_action = Some(OpenAction::Tracked(action));
                    }
                    None => {
                        tracing::warn!(message_id, action_type = %kind_attr, "dropping action of unknown type");
                        self.open_action = Some(OpenAction::Skipped);
                    }
                }
            }
            Tag::ActionClose => tracing::debug!(message_id, "ignoring stray action close tag"),
        }
    }

    fn append_to_action<O: ParserObserver + ?Sized>(
        &mut self,
        message_id: &str,
        chunk: &str,
        observer: &mut O,
    ) {
        if chunk.is_empty() {
            return;
        }
        let Some(OpenAction::Tracked(action)) = self.open_action.as_mut() else {
            return;
        };
        action.content.push_str(chunk);
        let artifact_id = self
            .open_artifact
            .as_ref()
            .map(|artifact| artifact.id.as_str())
            .unwrap_or_default();
        observer.on_action_delta(message_id, artifact_id, &action.id, chunk);
    }

    fn close_action<O: ParserObserver + ?Sized>(&mut self, message_id: &str, observer: &mut O) {
        let Some(OpenAction::Tracked(mut action)) = self.open_action.take() else {
            return;
        };
        action.finalize_content();
        if let Some(artifact) = self.open_artifact.as_mut() {
            observer.on_action_close(message_id, &artifact.id, &action);
            artifact.actions.push(action);
        }
    }
}

/// Owns one [`ParserSession`] per message id.
#[derive(Debug, Default)]
pub struct ParserRegistry {
    sessions: HashMap<String, ParserSession>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a session for `message_id` already existed.
    pub fn create_session(&mut self, message_id: &str) -> bool {
        if self.sessions.contains_key(message_id) {
            return false;
        }
        self.sessions
            .insert(message_id.to_string(), ParserSession::default());
        true
    }

    pub fn destroy_session(&mut self, message_id: &str) -> bool {
        self.sessions.remove(message_id).is_some()
    }

    pub fn has_session(&self, message_id: &str) -> bool {
        self.sessions.contains_key(message_id)
    }

    pub fn session(&self, message_id: &str) -> Option<&ParserSession> {
        self.sessions.get(message_id)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Consume whatever `full_text` adds beyond the previous call for this
    /// message, firing observer callbacks for every tag boundary crossed.
    ///
    /// Returns the newly consumed text that lies outside any artifact.
    pub fn parse<O: ParserObserver + ?Sized>(
        &mut self,
        message_id: &str,
        full_text: &str,
        observer: &mut O,
    ) -> String {
        let session = self
            .sessions
            .entry(message_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(message_id, "creating parser session");
                ParserSession::default()
            });
        session.advance(message_id, full_text, observer)
    }

    /// Last call for a message: parse `full_text`, then drop the session.
    /// A tail held back as a possible tag start is returned as prose, since
    /// no more text will complete it.
    pub fn finish_session<O: ParserObserver + ?Sized>(
        &mut self,
        message_id: &str,
        full_text: &str,
        observer: &mut O,
    ) -> String {
        let mut prose = self.parse(message_id, full_text, observer);
        let Some(session) = self.sessions.remove(message_id) else {
            return prose;
        };
        if session.open_artifact.is_some() {
            tracing::debug!(message_id, "message ended inside an artifact");
        } else if session.cursor < full_text.len() && full_text.is_char_boundary(session.cursor) {
            prose.push_str(&full_text[session.cursor..]);
        }
        prose
    }
}
