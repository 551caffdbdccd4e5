//! Wires the parsers, lock checks, batcher and scheduler together.
//!
//! Model output goes in through [`ArtifactPipeline::ingest`]. File writes
//! are checked against the lock state, resolved against known content when
//! they carry SEARCH/REPLACE blocks, and queued on the batcher. When a batch
//! flushes, the default handler writes files into the shared tree and the
//! [`FileStore`], then enqueues commands on the scheduler.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bolt_patch::{LineRange, apply_diff_patches_with, contains_diff_markers};
use bolt_stream::{
    Action, ActionKind, BlockClassifier, BlockKind, ContentBlock, ParserEvent, ParserRegistry,
};
use bolt_workspace::{ChangeSet, WorkspaceError, WorkspaceTree, normalize_path};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::batcher::{Batch, BatchHandler, DebouncedBatcher};
use crate::config::PipelineConfig;
use crate::error::RuntimeError;
use crate::scheduler::{CommandExecutor, CommandQueue};
use crate::snapshots::SnapshotLoop;

pub type SharedTree = Arc<RwLock<WorkspaceTree>>;

pub(crate) fn read_tree(tree: &SharedTree) -> RwLockReadGuard<'_, WorkspaceTree> {
    tree.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_tree(tree: &SharedTree) -> RwLockWriteGuard<'_, WorkspaceTree> {
    tree.write().unwrap_or_else(PoisonError::into_inner)
}

/// Destination for flushed file contents, e.g. a sandbox filesystem.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn write_file(&self, path: &str, content: &str) -> anyhow::Result<()>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryFileStore {
    files: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn files(&self) -> BTreeMap<String, String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn write_file(&self, path: &str, content: &str) -> anyhow::Result<()> {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), content.to_string());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    Artifact,
    Markdown,
}

/// What happened to the input of one `ingest` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum PipelineNotice {
    ArtifactOpened {
        artifact_id: String,
        title: String,
    },
    ArtifactCompleted {
        artifact_id: String,
        actions: usize,
    },
    FileQueued {
        path: String,
        source: ChangeSource,
    },
    CommandQueued {
        command: String,
        source: ChangeSource,
    },
    PatchApplied {
        path: String,
        touched_line_ranges: Vec<LineRange>,
    },
    /// A SEARCH/REPLACE update matched nothing; the file is left as is.
    PatchSkipped {
        path: String,
    },
    /// The target path is locked; the write was refused.
    Rejected {
        path: String,
        locked_by: String,
    },
}

struct ApplyBatch {
    tree: SharedTree,
    store: Arc<dyn FileStore>,
    scheduler: CommandQueue,
}

#[async_trait]
impl BatchHandler for ApplyBatch {
    async fn handle(&self, batch: Batch) -> anyhow::Result<()> {
        let mut failed = Vec::new();
        for (path, content) in &batch.files {
            // A lock may have been taken after the write was queued.
            if let Err(err) = read_tree(&self.tree).ensure_unlocked(path) {
                tracing::warn!(%path, error = %err, "dropping queued write to locked path");
                continue;
            }
            // The store goes first so the tree never claims content the store lacks.
            if let Err(err) = self.store.write_file(path, content).await {
                tracing::warn!(%path, error = %err, "store write failed");
                failed.push(path.as_str());
                continue;
            }
            if let Err(err) = write_tree(&self.tree).write_file(path, content.as_str()) {
                tracing::warn!(%path, error = %err, "tree write failed");
                failed.push(path.as_str());
            }
        }

        for command in batch.commands {
            self.scheduler.add_command(command);
        }
        if failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} file write(s) failed: {}", failed.len(), failed.join(", "))
        }
    }
}

pub struct ArtifactPipeline {
    config: PipelineConfig,
    parser: ParserRegistry,
    classifier: BlockClassifier,
    /// Text outside artifacts seen so far, per message, for the classifier.
    prose: HashMap<String, String>,
    tree: SharedTree,
    batcher: DebouncedBatcher,
    scheduler: CommandQueue,
}

impl ArtifactPipeline {
    pub fn new(
        config: PipelineConfig,
        executor: Arc<dyn CommandExecutor>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        Self::with_tree(config, WorkspaceTree::new(), executor, store)
    }

    pub fn with_tree(
        config: PipelineConfig,
        tree: WorkspaceTree,
        executor: Arc<dyn CommandExecutor>,
        store: Arc<dyn FileStore>,
    ) -> Self {
        let tree = Arc::new(RwLock::new(tree));
        let scheduler = CommandQueue::new(config.scheduler.clone(), executor);
        let handler = Arc::new(ApplyBatch {
            tree: tree.clone(),
            store,
            scheduler: scheduler.clone(),
        });
        let batcher = DebouncedBatcher::new(config.batcher.clone(), handler);
        Self {
            config,
            parser: ParserRegistry::new(),
            classifier: BlockClassifier::new(),
            prose: HashMap::new(),
            tree,
            batcher,
            scheduler,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tree(&self) -> SharedTree {
        self.tree.clone()
    }

    /// Run `f` against the tree, e.g. to lock paths.
    pub fn update_tree<R>(&self, f: impl FnOnce(&mut WorkspaceTree) -> R) -> R {
        f(&mut write_tree(&self.tree))
    }

    pub fn scheduler(&self) -> &CommandQueue {
        &self.scheduler
    }

    pub fn batcher(&self) -> &DebouncedBatcher {
        &self.batcher
    }

    /// Start periodic snapshots of the tree; change sets arrive on the
    /// returned receiver.
    pub fn spawn_snapshots(&self) -> (SnapshotLoop, mpsc::UnboundedReceiver<ChangeSet>) {
        SnapshotLoop::spawn(self.tree.clone(), self.config.snapshot.clone())
    }

    /// Feed the full text received so far for `message_id`.
    pub fn ingest(&mut self, message_id: &str, full_text: &str) -> Vec<PipelineNotice> {
        let mut events = Vec::new();
        let prose = self.parser.parse(message_id, full_text, &mut events);
        let mut notices = Vec::new();
        self.handle_events(events, &mut notices);

        if self.config.classify_markdown && !prose.is_empty() {
            let text = self.prose.entry(message_id.to_string()).or_default();
            text.push_str(&prose);
            let blocks = self.classifier.parse(message_id, text);
            for block in blocks {
                self.stage_block(block, &mut notices);
            }
        }
        notices
    }

    /// Last call for a message, with its complete text. Stages whatever was
    /// held back while the text could still grow, then releases the
    /// per-message parser and classifier state.
    pub fn finish_message(&mut self, message_id: &str, full_text: &str) -> Vec<PipelineNotice> {
        let mut events = Vec::new();
        let prose = self.parser.finish_session(message_id, full_text, &mut events);
        let mut notices = Vec::new();
        self.handle_events(events, &mut notices);

        let mut text = self.prose.remove(message_id).unwrap_or_default();
        if self.config.classify_markdown {
            text.push_str(&prose);
            for block in self.classifier.finish(message_id, &text) {
                self.stage_block(block, &mut notices);
            }
        }
        self.classifier.forget(message_id);
        notices
    }

    fn handle_events(&self, events: Vec<ParserEvent>, notices: &mut Vec<PipelineNotice>) {
        for event in events {
            match event {
                ParserEvent::ArtifactOpen {
                    artifact_id, title, ..
                } => notices.push(PipelineNotice::ArtifactOpened { artifact_id, title }),
                ParserEvent::ActionClose { action, .. } => self.stage_action(action, notices),
                ParserEvent::ArtifactComplete { artifact, .. } => {
                    notices.push(PipelineNotice::ArtifactCompleted {
                        artifact_id: artifact.id,
                        actions: artifact.actions.len(),
                    })
                }
                ParserEvent::ActionOpen { .. } | ParserEvent::ActionDelta { .. } => {}
            }
        }
    }

    /// Flush the batcher now. Returns the batch id if anything was pending.
    pub async fn flush(&self) -> Option<String> {
        self.batcher.flush().await
    }

    /// Flush, wait for every batch to be applied and every command to
    /// finish.
    pub async fn settle(&self) {
        self.batcher.drain().await;
        self.scheduler.wait_idle().await;
    }

    fn stage_action(&self, action: Action, notices: &mut Vec<PipelineNotice>) {
        match action.kind {
            ActionKind::File => match action.file_path {
                Some(path) => self.stage_file(&path, action.content, ChangeSource::Artifact, notices),
                None => tracing::warn!(action_id = %action.id, "file action has no path; skipped"),
            },
            ActionKind::Shell if !action.content.is_empty() => {
                self.stage_command(action.content, ChangeSource::Artifact, notices)
            }
            ActionKind::Shell => {}
        }
    }

    fn stage_block(&self, block: ContentBlock, notices: &mut Vec<PipelineNotice>) {
        match block.kind {
            BlockKind::File => {
                if let Some(path) = block.file_path.as_deref() {
                    self.stage_file(path, block.payload.clone(), ChangeSource::Markdown, notices);
                }
            }
            BlockKind::Command => {
                for command in block.commands() {
                    self.stage_command(command.to_string(), ChangeSource::Markdown, notices);
                }
            }
            BlockKind::Text => {}
        }
    }

    fn admit(&self, path: &str) -> Result<(), RuntimeError> {
        read_tree(&self.tree).ensure_unlocked(path)?;
        Ok(())
    }

    fn stage_file(
        &self,
        path: &str,
        content: String,
        source: ChangeSource,
        notices: &mut Vec<PipelineNotice>,
    ) {
        let path = normalize_path(path);
        match self.admit(&path) {
            Ok(()) => {}
            Err(RuntimeError::Workspace(WorkspaceError::Locked { path, locked_by })) => {
                tracing::info!(%path, %locked_by, "write refused: path is locked");
                notices.push(PipelineNotice::Rejected { path, locked_by });
                return;
            }
            Err(err) => {
                tracing::warn!(%path, error = %err, "write refused");
                return;
            }
        }

        let content = if contains_diff_markers(&content) {
            let base = self
                .batcher
                .pending_file(&path)
                .or_else(|| read_tree(&self.tree).read_file(&path).ok().map(str::to_string))
                .unwrap_or_default();
            let result = apply_diff_patches_with(&base, &content, self.config.patch_options());
            if !result.has_changes {
                tracing::debug!(%path, "patch matched nothing; keeping current content");
                notices.push(PipelineNotice::PatchSkipped { path });
                return;
            }
            notices.push(PipelineNotice::PatchApplied {
                path: path.clone(),
                touched_line_ranges: result.touched_line_ranges,
            });
            result.modified_content
        } else {
            content
        };

        self.batcher.add_file(path.clone(), content);
        notices.push(PipelineNotice::FileQueued { path, source });
    }

    fn stage_command(&self, command: String, source: ChangeSource, notices: &mut Vec<PipelineNotice>) {
        self.batcher.add_command(command.clone());
        notices.push(PipelineNotice::CommandQueued { command, source });
    }
}
