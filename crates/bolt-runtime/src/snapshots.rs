//! Periodic snapshotting of the shared tree.

use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use bolt_workspace::{ChangeSet, SnapshotTracker};

use crate::config::SnapshotConfig;
use crate::pipeline::{SharedTree, read_tree};

/// Background task that snapshots the tree every `interval` and reports
/// non-empty change sets. Dropping the handle also stops the loop.
pub struct SnapshotLoop {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<SnapshotTracker>,
}

impl SnapshotLoop {
    pub fn spawn(
        tree: SharedTree,
        config: SnapshotConfig,
    ) -> (Self, mpsc::UnboundedReceiver<ChangeSet>) {
        let (changes_tx, changes_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut tracker = SnapshotTracker::new(config.max_history);
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        record(&tree, &mut tracker, &changes_tx);
                    }
                    _ = &mut shutdown_rx => {
                        record(&tree, &mut tracker, &changes_tx);
                        tracing::debug!(snapshots = tracker.len(), "snapshot loop stopped");
                        break;
                    }
                }
            }
            tracker
        });

        (
            Self {
                shutdown: Some(shutdown_tx),
                handle,
            },
            changes_rx,
        )
    }

    /// Take a final snapshot, stop the loop and return its history.
    pub async fn stop(mut self) -> Result<SnapshotTracker, JoinError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        (&mut self.handle).await
    }
}

fn record(
    tree: &SharedTree,
    tracker: &mut SnapshotTracker,
    changes: &mpsc::UnboundedSender<ChangeSet>,
) {
    let change_set = {
        let tree = read_tree(tree);
        tracker.record(&tree)
    };
    if let Some(change_set) = change_set.filter(|set| !set.is_empty()) {
        tracing::info!(
            snapshot = change_set.to,
            files = change_set.changes.len(),
            lines_added = change_set.lines_added(),
            lines_removed = change_set.lines_removed(),
            "workspace changed"
        );
        // The receiver may be gone; history is still kept.
        let _ = changes.send(change_set);
    }
}
