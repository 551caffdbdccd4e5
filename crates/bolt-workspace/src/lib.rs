//! In-memory project tree with hierarchical locks and snapshot history.

mod error;
mod lock;
mod path;
mod snapshot;
mod tree;

pub use error::{WorkspaceError, WorkspaceResult};
pub use lock::Lock;
pub use path::normalize_path;
pub use snapshot::{ChangeKind, ChangeSet, FileChange, Snapshot, SnapshotTracker};
pub use tree::{Dirent, WorkspaceTree};
