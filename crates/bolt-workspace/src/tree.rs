use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::lock::Lock;
use crate::path::{ancestors, child_prefix, normalize_path};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dirent {
    File {
        content: String,
        #[serde(default)]
        lock: Lock,
    },
    Folder {
        #[serde(default)]
        lock: Lock,
    },
}

impl Dirent {
    pub fn lock(&self) -> &Lock {
        match self {
            Dirent::File { lock, .. } | Dirent::Folder { lock } => lock,
        }
    }

    fn lock_mut(&mut self) -> &mut Lock {
        match self {
            Dirent::File { lock, .. } | Dirent::Folder { lock } => lock,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Dirent::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Dirent::Folder { .. })
    }
}

/// Flat path-keyed map of files and folders.
///
/// Writes do not consult locks; callers check [`WorkspaceTree::ensure_unlocked`]
/// first and refuse the mutation themselves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceTree {
    entries: BTreeMap<String, Dirent>,
}

impl WorkspaceTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<String>,
    {
        let mut tree = Self::new();
        for (path, content) in files {
            // A path that collides with an existing folder is skipped.
            let _ = tree.write_file(path.as_ref(), content);
        }
        tree
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Dirent> {
        self.entries.get(&normalize_path(path))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Dirent)> {
        self.entries.iter().map(|(path, dirent)| (path.as_str(), dirent))
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().filter_map(|(path, dirent)| match dirent {
            Dirent::File { content, .. } => Some((path.as_str(), content.as_str())),
            Dirent::Folder { .. } => None,
        })
    }

    /// Plain `path -> content` view of every file.
    pub fn file_contents(&self) -> BTreeMap<String, String> {
        self.files()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect()
    }

    pub fn read_file(&self, path: &str) -> WorkspaceResult<&str> {
        let key = normalize_path(path);
        match self.entries.get(&key) {
            Some(Dirent::File { content, .. }) => Ok(content),
            Some(Dirent::Folder { .. }) => Err(WorkspaceError::NotAFile(key)),
            None => Err(WorkspaceError::NotFound(key)),
        }
    }

    /// Create or overwrite a file, creating missing parent folders.
    ///
    /// An existing file keeps its lock state. Returns `true` if the file is new.
    pub fn write_file(&mut self, path: &str, content: impl Into<String>) -> WorkspaceResult<bool> {
        let key = normalize_path(path);
        if key == "/" {
            return Err(WorkspaceError::NotAFile(key));
        }
        if let Some(Dirent::Folder { .. }) = self.entries.get(&key) {
            return Err(WorkspaceError::NotAFile(key));
        }
        self.create_parents(&key)?;

        let content = content.into();
        match self.entries.get_mut(&key) {
            Some(Dirent::File { content: existing, .. }) => {
                *existing = content;
                Ok(false)
            }
            _ => {
                self.entries.insert(
                    key,
                    Dirent::File {
                        content,
                        lock: Lock::default(),
                    },
                );
                Ok(true)
            }
        }
    }

    pub fn create_folder(&mut self, path: &str) -> WorkspaceResult<()> {
        let key = normalize_path(path);
        if let Some(Dirent::File { .. }) = self.entries.get(&key) {
            return Err(WorkspaceError::NotAFolder(key));
        }
        self.create_parents(&key)?;
        self.entries
            .entry(key)
            .or_insert_with(|| Dirent::Folder { lock: Lock::default() });
        Ok(())
    }

    fn create_parents(&mut self, key: &str) -> WorkspaceResult<()> {
        for parent in ancestors(key) {
            match self.entries.get(parent) {
                Some(Dirent::Folder { .. }) => {}
                Some(Dirent::File { .. }) => return Err(WorkspaceError::NotAFolder(parent.to_string())),
                None => {
                    self.entries
                        .insert(parent.to_string(), Dirent::Folder { lock: Lock::default() });
                }
            }
        }
        Ok(())
    }

    /// Remove an entry; removing a folder removes everything beneath it.
    /// Returns the number of entries removed.
    pub fn remove(&mut self, path: &str) -> WorkspaceResult<usize> {
        let key = normalize_path(path);
        let Some(removed) = self.entries.remove(&key) else {
            return Err(WorkspaceError::NotFound(key));
        };
        let mut count = 1;
        if removed.is_folder() {
            let prefix = child_prefix(&key);
            let before = self.entries.len();
            self.entries.retain(|path, _| !path.starts_with(&prefix));
            count += before - self.entries.len();
        }
        Ok(count)
    }

    pub fn lock_of(&self, path: &str) -> Option<&Lock> {
        self.get(path).map(Dirent::lock)
    }

    /// Whether the entry itself carries a lock. Ancestors are not consulted,
    /// and a missing entry is unlocked.
    pub fn is_locked(&self, path: &str) -> bool {
        self.lock_of(path).is_some_and(|lock| lock.is_locked)
    }

    /// Admission check for any mutation of `path`.
    pub fn ensure_unlocked(&self, path: &str) -> WorkspaceResult<()> {
        let key = normalize_path(path);
        match self.entries.get(&key).map(Dirent::lock) {
            Some(lock) if lock.is_locked => Err(WorkspaceError::Locked {
                locked_by: lock.locked_by_folder.clone().unwrap_or_else(|| key.clone()),
                path: key,
            }),
            _ => Ok(()),
        }
    }

    /// Lock a single file. This makes it independent of any folder lock
    /// that covered it before.
    pub fn lock_file(&mut self, path: &str) -> WorkspaceResult<()> {
        let key = normalize_path(path);
        let lock = self.file_lock_mut(&key)?;
        *lock = Lock::direct();
        tracing::debug!(path = %key, "file locked");
        Ok(())
    }

    pub fn unlock_file(&mut self, path: &str) -> WorkspaceResult<()> {
        let key = normalize_path(path);
        let lock = self.file_lock_mut(&key)?;
        *lock = Lock::default();
        tracing::debug!(path = %key, "file unlocked");
        Ok(())
    }

    /// Lock a folder and every file currently beneath it. Files locked on
    /// their own are left alone; files held by an outer folder move to this,
    /// nearer, one. Files created later are not affected.
    ///
    /// Returns the number of files newly locked through the folder.
    pub fn lock_folder(&mut self, path: &str) -> WorkspaceResult<usize> {
        let key = normalize_path(path);
        self.folder_lock_mut(&key)?.is_locked = true;

        let prefix = child_prefix(&key);
        let mut propagated = 0;
        for (child, dirent) in self.entries.iter_mut() {
            if !child.starts_with(&prefix) {
                continue;
            }
            let Dirent::File { lock, .. } = dirent else {
                continue;
            };
            let held_by_outer = lock
                .locked_by_folder
                .as_deref()
                .is_some_and(|owner| key.starts_with(&child_prefix(owner)));
            if !lock.is_locked {
                *lock = Lock::via_folder(&key);
                propagated += 1;
            } else if held_by_outer {
                *lock = Lock::via_folder(&key);
            }
        }
        tracing::debug!(path = %key, propagated, "folder locked");
        Ok(propagated)
    }

    /// Unlock a folder and the files it holds. A file that also sits under
    /// another locked folder is handed to the nearest one instead of being
    /// released.
    ///
    /// Returns the number of files released.
    pub fn unlock_folder(&mut self, path: &str) -> WorkspaceResult<usize> {
        let key = normalize_path(path);
        self.folder_lock_mut(&key)?.is_locked = false;

        let locked_folders: HashSet<String> = self
            .entries
            .iter()
            .filter(|(_, dirent)| dirent.is_folder() && dirent.lock().is_locked)
            .map(|(folder, _)| folder.clone())
            .collect();

        let mut released = 0;
        for (child, dirent) in self.entries.iter_mut() {
            let lock = dirent.lock_mut();
            if lock.locked_by_folder.as_deref() != Some(key.as_str()) {
                continue;
            }
            match ancestors(child).filter(|a| locked_folders.contains(*a)).last() {
                Some(owner) => *lock = Lock::via_folder(owner),
                None => {
                    *lock = Lock::default();
                    released += 1;
                }
            }
        }
        tracing::debug!(path = %key, released, "folder unlocked");
        Ok(released)
    }

    fn file_lock_mut(&mut self, key: &str) -> WorkspaceResult<&mut Lock> {
        match self.entries.get_mut(key) {
            Some(Dirent::File { lock, .. }) => Ok(lock),
            Some(Dirent::Folder { .. }) => Err(WorkspaceError::NotAFile(key.to_string())),
            None => Err(WorkspaceError::NotFound(key.to_string())),
        }
    }

    fn folder_lock_mut(&mut self, key: &str) -> WorkspaceResult<&mut Lock> {
        match self.entries.get_mut(key) {
            Some(Dirent::Folder { lock }) => Ok(lock),
            Some(Dirent::File { .. }) => Err(WorkspaceError::NotAFolder(key.to_string())),
            None if key == "/" => Err(WorkspaceError::NotAFolder(key.to_string())),
            None => Err(WorkspaceError::NotFound(key.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parent_folders() {
        let mut tree = WorkspaceTree::new();
        assert_eq!(tree.write_file("src/components/Button.jsx", "x"), Ok(true));
        assert!(tree.get("/src").is_some_and(Dirent::is_folder));
        assert!(tree.get("/src/components").is_some_and(Dirent::is_folder));
        assert_eq!(tree.read_file("/src/components/Button.jsx"), Ok("x"));
        assert_eq!(tree.write_file("/src/components/Button.jsx", "y"), Ok(false));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn file_and_folder_kinds_do_not_mix() {
        let mut tree = WorkspaceTree::new();
        tree.write_file("/a.txt", "").unwrap();
        assert_eq!(
            tree.write_file("/a.txt/b.txt", ""),
            Err(WorkspaceError::NotAFolder("/a.txt".into()))
        );
        tree.create_folder("/dir").unwrap();
        assert_eq!(tree.write_file("/dir", ""), Err(WorkspaceError::NotAFile("/dir".into())));
        assert_eq!(tree.lock_folder("/a.txt"), Err(WorkspaceError::NotAFolder("/a.txt".into())));
        assert_eq!(tree.lock_file("/dir"), Err(WorkspaceError::NotAFile("/dir".into())));
    }

    #[test]
    fn removing_folder_removes_descendants() {
        let mut tree = WorkspaceTree::from_files([("/src/a.js", "a"), ("/src/lib/b.js", "b"), ("/srcx.js", "c")]);
        assert_eq!(tree.remove("/src"), Ok(4));
        assert!(tree.contains("/srcx.js"));
        assert_eq!(tree.remove("/src"), Err(WorkspaceError::NotFound("/src".into())));
    }

    #[test]
    fn ensure_unlocked_names_the_holder() {
        let mut tree = WorkspaceTree::from_files([("/src/a.js", "a"), ("/b.js", "b")]);
        tree.lock_folder("/src").unwrap();
        tree.lock_file("/b.js").unwrap();

        assert_eq!(
            tree.ensure_unlocked("src/a.js"),
            Err(WorkspaceError::Locked {
                path: "/src/a.js".into(),
                locked_by: "/src".into(),
            })
        );
        assert_eq!(
            tree.ensure_unlocked("/b.js"),
            Err(WorkspaceError::Locked {
                path: "/b.js".into(),
                locked_by: "/b.js".into(),
            })
        );
        assert_eq!(tree.ensure_unlocked("/src/new.js"), Ok(()));
    }

    #[test]
    fn folder_lock_does_not_leak_to_sibling_prefixes() {
        let mut tree = WorkspaceTree::from_files([("/src/a.js", "a"), ("/srcx/b.js", "b")]);
        assert_eq!(tree.lock_folder("/src"), Ok(1));
        assert!(tree.is_locked("/src/a.js"));
        assert!(!tree.is_locked("/srcx/b.js"));
    }

    #[test]
    fn direct_lock_detaches_file_from_folder() {
        let mut tree = WorkspaceTree::from_files([("/src/a.js", "a")]);
        tree.lock_folder("/src").unwrap();
        tree.lock_file("/src/a.js").unwrap();
        assert_eq!(tree.unlock_folder("/src"), Ok(0));
        assert!(tree.is_locked("/src/a.js"));
    }

    #[test]
    fn tree_serializes_with_tagged_entries() {
        let tree = WorkspaceTree::from_files([("/a.txt", "hi")]);
        let json = serde_json::to_value(&tree).expect("serialize");
        assert_eq!(json["entries"]["/a.txt"]["type"], "file");
        assert_eq!(json["entries"]["/a.txt"]["content"], "hi");
    }
}
