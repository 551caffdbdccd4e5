//! Full-tree snapshots and the change sets between them.

use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use crate::tree::WorkspaceTree;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: u64,
    pub taken_at_ms: u64,
    pub files: BTreeMap<String, String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Unified diff text; present for modified files only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Snapshot the changes are relative to; `None` for the first one.
    pub from: Option<u64>,
    pub to: u64,
    pub changes: Vec<FileChange>,
}

impl ChangeSet {
    /// Compare two `path -> content` maps. Changes are ordered by path.
    pub fn between(
        before: &BTreeMap<String, String>,
        after: &BTreeMap<String, String>,
    ) -> Vec<FileChange> {
        let mut changes = Vec::new();
        for (path, old) in before {
            match after.get(path) {
                None => changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Removed,
                    lines_added: 0,
                    lines_removed: old.lines().count(),
                    diff: None,
                }),
                Some(new) if new != old => changes.push(modified(path, old, new)),
                Some(_) => {}
            }
        }
        for (path, new) in after {
            if !before.contains_key(path) {
                changes.push(FileChange {
                    path: path.clone(),
                    kind: ChangeKind::Added,
                    lines_added: new.lines().count(),
                    lines_removed: 0,
                    diff: None,
                });
            }
        }
        changes.sort_by(|a, b| a.path.cmp(&b.path));
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &FileChange> {
        self.changes.iter().filter(move |change| change.kind == kind)
    }

    pub fn lines_added(&self) -> usize {
        self.changes.iter().map(|c| c.lines_added).sum()
    }

    pub fn lines_removed(&self) -> usize {
        self.changes.iter().map(|c| c.lines_removed).sum()
    }
}

fn modified(path: &str, old: &str, new: &str) -> FileChange {
    let diff = TextDiff::from_lines(old, new);
    let mut lines_added = 0;
    let mut lines_removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => lines_added += 1,
            ChangeTag::Delete => lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }
    let unified = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("a{path}"), &format!("b{path}"))
        .to_string();
    FileChange {
        path: path.to_string(),
        kind: ChangeKind::Modified,
        lines_added,
        lines_removed,
        diff: Some(unified),
    }
}

/// Bounded history of tree snapshots.
#[derive(Debug)]
pub struct SnapshotTracker {
    max_history: usize,
    next_id: u64,
    history: VecDeque<Snapshot>,
}

impl SnapshotTracker {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history: max_history.max(1),
            next_id: 1,
            history: VecDeque::new(),
        }
    }

    /// Snapshot `tree` and return what changed since the previous snapshot.
    ///
    /// Returns `None`, recording nothing, if no file differs.
    pub fn record(&mut self, tree: &WorkspaceTree) -> Option<ChangeSet> {
        let files = tree.file_contents();
        let previous = self.history.back();
        if previous.is_some_and(|snapshot| snapshot.files == files) {
            return None;
        }

        let empty = BTreeMap::new();
        let changes = ChangeSet::between(previous.map_or(&empty, |s| &s.files), &files);
        let from = previous.map(|s| s.id);
        let id = self.next_id;
        self.next_id += 1;

        self.history.push_back(Snapshot {
            id,
            taken_at_ms: unix_millis(),
            files,
        });
        while self.history.len() > self.max_history {
            self.history.pop_front();
        }
        tracing::debug!(snapshot = id, changes = changes.len(), "snapshot recorded");

        Some(ChangeSet {
            from,
            to: id,
            changes,
        })
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.history.back()
    }

    pub fn get(&self, id: u64) -> Option<&Snapshot> {
        self.history.iter().find(|snapshot| snapshot.id == id)
    }

    pub fn history(&self) -> impl Iterator<Item = &Snapshot> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Changes between two retained snapshots.
    pub fn diff(&self, from: u64, to: u64) -> Option<ChangeSet> {
        let before = self.get(from)?;
        let after = self.get(to)?;
        Some(ChangeSet {
            from: Some(from),
            to,
            changes: ChangeSet::between(&before.files, &after.files),
        })
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
