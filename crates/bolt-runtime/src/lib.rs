//! Asynchronous side of the artifact pipeline: command scheduling,
//! debounced batching, snapshotting and the glue that connects them to the
//! parsers in `bolt-stream` and the patch engine in `bolt-patch`.

mod batcher;
mod command;
mod config;
mod error;
mod pipeline;
mod scheduler;
mod snapshots;

pub use batcher::{Batch, BatchHandler, BatcherStats, DebouncedBatcher};
pub use command::{Command, CommandEvent, CommandId, CommandKind, CommandStatus};
pub use config::{BatcherConfig, PipelineConfig, SchedulerConfig, SnapshotConfig};
pub use error::RuntimeError;
pub use pipeline::{
    ArtifactPipeline, ChangeSource, FileStore, MemoryFileStore, PipelineNotice, SharedTree,
};
pub use scheduler::{CommandExecutor, CommandQueue};
pub use snapshots::SnapshotLoop;
