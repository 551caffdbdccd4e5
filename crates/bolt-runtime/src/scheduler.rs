//! Bounded-concurrency FIFO command queue.
//!
//! Commands are admitted in enqueue order while fewer than
//! `max_concurrent` are running; each admitted command runs on its own
//! tokio task through the injected [`CommandExecutor`]. Execution failures
//! and timeouts are recorded on the command, never returned to the caller.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use tokio::time::{Instant, timeout};

use crate::command::{Command, CommandEvent, CommandId, CommandStatus};
use crate::config::SchedulerConfig;
use crate::error::RuntimeError;

const EVENT_CAPACITY: usize = 256;

/// Runs one shell command; `Ok` carries its captured output.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &Command) -> anyhow::Result<String>;
}

#[derive(Default)]
struct QueueState {
    next_id: CommandId,
    commands: BTreeMap<CommandId, Command>,
    pending: VecDeque<CommandId>,
    running: usize,
    /// Terminal commands in the order they finished.
    completed: Vec<CommandId>,
}

struct Inner {
    config: SchedulerConfig,
    executor: Arc<dyn CommandExecutor>,
    state: Mutex<QueueState>,
    events: broadcast::Sender<CommandEvent>,
    idle: Notify,
}

/// Cheap to clone; all clones share one queue.
///
/// Adding or retrying a command spawns tokio tasks, so those calls must be
/// made from within a tokio runtime.
#[derive(Clone)]
pub struct CommandQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CommandQueue")
            .field("pending", &state.pending.len())
            .field("running", &state.running)
            .field("completed", &state.completed.len())
            .finish()
    }
}

impl CommandQueue {
    pub fn new(config: SchedulerConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config: SchedulerConfig {
                    max_concurrent: config.max_concurrent.max(1),
                    ..config
                },
                executor,
                state: Mutex::new(QueueState::default()),
                events,
                idle: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CommandEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.inner.events.subscribe()
    }

    /// Append a command to the queue tail and start it if a slot is free.
    pub fn add_command(&self, text: impl Into<String>) -> CommandId {
        let text = text.into();
        let id = {
            let mut state = self.lock();
            state.next_id += 1;
            let id = state.next_id;
            state.commands.insert(id, Command::new(id, text.clone()));
            state.pending.push_back(id);
            id
        };
        tracing::debug!(command_id = id, command = %text, "command queued");
        self.emit(CommandEvent::Queued { id, text });
        self.pump();
        id
    }

    /// Requeue a failed command at the tail. Any other status is left alone
    /// and `false` is returned.
    pub fn retry_command(&self, id: CommandId) -> bool {
        {
            let mut state = self.lock();
            let Some(command) = state.commands.get_mut(&id) else {
                return false;
            };
            if command.status != CommandStatus::Failed {
                tracing::debug!(command_id = id, status = ?command.status, "retry ignored");
                return false;
            }
            command.status = CommandStatus::Pending;
            command.error = None;
            command.output = None;
            command.duration_ms = None;
            state.completed.retain(|done| *done != id);
            state.pending.push_back(id);
        }
        tracing::info!(command_id = id, "command requeued");
        self.emit(CommandEvent::Requeued { id });
        self.pump();
        true
    }

    pub fn get(&self, id: CommandId) -> Option<Command> {
        self.lock().commands.get(&id).cloned()
    }

    /// Every command ever added, by id.
    pub fn commands(&self) -> Vec<Command> {
        self.lock().commands.values().cloned().collect()
    }

    /// Finished commands in completion order.
    pub fn completed(&self) -> Vec<Command> {
        let state = self.lock();
        state
            .completed
            .iter()
            .filter_map(|id| state.commands.get(id).cloned())
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn running_count(&self) -> usize {
        self.lock().running
    }

    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() && state.running == 0
    }

    /// Resolve once nothing is pending or running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn pump(&self) {
        loop {
            let command = {
                let mut state = self.lock();
                if state.running >= self.inner.config.max_concurrent {
                    return;
                }
                let Some(id) = state.pending.pop_front() else {
                    return;
                };
                let Some(command) = state.commands.get_mut(&id) else {
                    continue;
                };
                command.status = CommandStatus::Running;
                command.attempts += 1;
                let command = command.clone();
                state.running += 1;
                command
            };
            tracing::info!(command_id = command.id, command = %command.text, "command started");
            self.emit(CommandEvent::Started { id: command.id });

            let queue = self.clone();
            tokio::spawn(async move { queue.run(command).await });
        }
    }

    async fn run(self, command: Command) {
        let started = Instant::now();
        let executor = self.inner.executor.clone();
        let job = command.clone();
        // A separate task so a panicking executor still releases its slot.
        let mut task = tokio::spawn(async move { executor.execute(&job).await });
        let joined = match self.inner.config.command_timeout {
            Some(limit) => match timeout(limit, &mut task).await {
                Ok(joined) => Ok(joined),
                Err(_) => {
                    task.abort();
                    Err(RuntimeError::Timeout(limit))
                }
            },
            None => Ok(task.await),
        };
        let result = joined.and_then(|joined| match joined {
            Ok(outcome) => outcome.map_err(|err| RuntimeError::Executor(format!("{err:#}"))),
            Err(err) if err.is_panic() => Err(RuntimeError::Executor("executor panicked".into())),
            Err(err) => Err(RuntimeError::Executor(err.to_string())),
        });
        let duration_ms = started.elapsed().as_millis() as u64;

        let status = {
            let mut state = self.lock();
            state.running = state.running.saturating_sub(1);
            state.completed.push(command.id);
            state.commands.get_mut(&command.id).map(|entry| {
                entry.duration_ms = Some(duration_ms);
                match result {
                    Ok(output) => {
                        entry.status = CommandStatus::Completed;
                        entry.output = Some(output);
                    }
                    Err(err) => {
                        tracing::warn!(command_id = command.id, error = %err, "command failed");
                        entry.status = CommandStatus::Failed;
                        entry.error = Some(err.to_string());
                    }
                }
                entry.status
            })
        };
        if let Some(status) = status {
            tracing::info!(command_id = command.id, ?status, duration_ms, "command finished");
            self.emit(CommandEvent::Finished {
                id: command.id,
                status,
                duration_ms,
            });
        }

        self.pump();
        if self.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }
}
