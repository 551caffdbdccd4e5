//! Debounced coalescing of file writes and commands into batches.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::command::unix_millis;
use crate::config::BatcherConfig;
use crate::error::RuntimeError;

/// A set of mutations flushed together. Handed to the handler exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub created_at_ms: u64,
    pub files: BTreeMap<String, String>,
    pub commands: Vec<String>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.commands.is_empty()
    }
}

#[async_trait]
pub trait BatchHandler: Send + Sync {
    async fn handle(&self, batch: Batch) -> anyhow::Result<()>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherStats {
    pub flushed: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Pending {
    files: BTreeMap<String, String>,
    commands: Vec<String>,
    /// Bumped on every addition and flush; a timer only fires for the
    /// generation it was started for.
    generation: u64,
    timer: Option<JoinHandle<()>>,
    /// Batches taken but not yet handled.
    in_flight: usize,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.files.is_empty() && self.commands.is_empty()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn take_batch(&mut self) -> Option<Batch> {
        self.cancel_timer();
        self.generation += 1;
        if self.is_empty() {
            return None;
        }
        self.in_flight += 1;
        Some(Batch {
            id: Uuid::new_v4().to_string(),
            created_at_ms: unix_millis(),
            files: std::mem::take(&mut self.files),
            commands: std::mem::take(&mut self.commands),
        })
    }
}

struct Inner {
    config: BatcherConfig,
    handler: Arc<dyn BatchHandler>,
    pending: Mutex<Pending>,
    settled: Notify,
    flushed: AtomicU64,
    failed: AtomicU64,
}

/// Cheap to clone; clones share pending state.
///
/// Additions start tokio timers, so they must happen inside a runtime.
#[derive(Clone)]
pub struct DebouncedBatcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DebouncedBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.lock();
        f.debug_struct("DebouncedBatcher")
            .field("files", &pending.files.len())
            .field("commands", &pending.commands.len())
            .finish()
    }
}

impl DebouncedBatcher {
    pub fn new(config: BatcherConfig, handler: Arc<dyn BatchHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                handler,
                pending: Mutex::new(Pending::default()),
                settled: Notify::new(),
                flushed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a file write. A later write to the same path replaces it.
    pub fn add_file(&self, path: impl Into<String>, content: impl Into<String>) {
        let mut pending = self.lock();
        pending.files.insert(path.into(), content.into());
        if pending.files.len() >= self.inner.config.max_pending_files {
            let batch = pending.take_batch();
            drop(pending);
            tracing::debug!("pending file limit reached; flushing early");
            if let Some(batch) = batch {
                let batcher = self.clone();
                tokio::spawn(async move { batcher.dispatch(batch).await });
            }
            return;
        }
        self.restart_timer(&mut pending);
    }

    pub fn add_command(&self, command: impl Into<String>) {
        let mut pending = self.lock();
        pending.commands.push(command.into());
        self.restart_timer(&mut pending);
    }

    /// Content of a file that is queued but not yet flushed.
    pub fn pending_file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn pending_counts(&self) -> (usize, usize) {
        let pending = self.lock();
        (pending.files.len(), pending.commands.len())
    }

    pub fn stats(&self) -> BatcherStats {
        BatcherStats {
            flushed: self.inner.flushed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    /// Cancel the pending timer and hand everything queued to the handler
    /// now. Returns the batch id, or `None` if nothing was pending.
    pub async fn flush(&self) -> Option<String> {
        let batch = self.lock().take_batch()?;
        let id = batch.id.clone();
        self.dispatch(batch).await;
        Some(id)
    }

    /// Flush, then wait until every batch handed off so far, including
    /// timer and size-window flushes, has been handled.
    pub async fn drain(&self) {
        loop {
            let settled = self.inner.settled.notified();
            self.flush().await;
            {
                let pending = self.lock();
                if pending.in_flight == 0 && pending.is_empty() {
                    return;
                }
            }
            settled.await;
        }
    }

    fn restart_timer(&self, pending: &mut Pending) {
        pending.cancel_timer();
        pending.generation += 1;
        let generation = pending.generation;
        let delay = self.inner.config.delay;
        let batcher = self.clone();
        pending.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            batcher.fire(generation).await;
        }));
    }

    async fn fire(&self, generation: u64) {
        let batch = {
            let mut pending = self.lock();
            if pending.generation != generation {
                return;
            }
            // Detach ourselves first so take_batch does not abort this task.
            pending.timer = None;
            pending.take_batch()
        };
        if let Some(batch) = batch {
            self.dispatch(batch).await;
        }
    }

    async fn dispatch(&self, batch: Batch) {
        let batch_id = batch.id.clone();
        let (files, commands) = (batch.files.len(), batch.commands.len());
        tracing::debug!(%batch_id, files, commands, "dispatching batch");
        match self.inner.handler.handle(batch).await {
            Ok(()) => {
                self.inner.flushed.fetch_add(1, Ordering::Relaxed);
                tracing::info!(%batch_id, files, commands, "batch applied");
            }
            Err(err) => {
                self.inner.failed.fetch_add(1, Ordering::Relaxed);
                let err = RuntimeError::Handler(format!("{err:#}"));
                tracing::warn!(%batch_id, error = %err, "batch handler failed");
            }
        }

        let settled = {
            let mut pending = self.lock();
            pending.in_flight = pending.in_flight.saturating_sub(1);
            pending.in_flight == 0
        };
        if settled {
            self.inner.settled.notify_waiters();
        }
    }
}
