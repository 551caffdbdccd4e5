use std::time::Duration;

use bolt_patch::PatchOptions;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Upper bound on commands executing at once.
    pub max_concurrent: usize,
    /// Per-command deadline; `None` lets commands run indefinitely.
    pub command_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            command_timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatcherConfig {
    /// Quiet period after the last addition before a batch is emitted.
    pub delay: Duration,
    /// Distinct pending files that force an immediate flush.
    pub max_pending_files: usize,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            max_pending_files: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub interval: Duration,
    pub max_history: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_history: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub scheduler: SchedulerConfig,
    pub batcher: BatcherConfig,
    pub snapshot: SnapshotConfig,
    /// Run the heuristic block classifier over text outside artifacts.
    pub classify_markdown: bool,
    /// Whitespace-tolerant matching for embedded SEARCH/REPLACE patches.
    pub fuzzy_patching: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            batcher: BatcherConfig::default(),
            snapshot: SnapshotConfig::default(),
            classify_markdown: true,
            fuzzy_patching: false,
        }
    }
}

impl PipelineConfig {
    pub fn patch_options(&self) -> PatchOptions {
        PatchOptions {
            fuzzy_whitespace: self.fuzzy_patching,
        }
    }
}
