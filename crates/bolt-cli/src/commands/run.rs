//! `bolt run` command.

use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bolt_runtime::{
    ArtifactPipeline, BatcherConfig, Command, CommandExecutor, CommandStatus, FileStore,
    MemoryFileStore, PipelineConfig, PipelineNotice, SchedulerConfig,
};
use bolt_workspace::{WorkspaceTree, normalize_path};
use clap::Args;
use serde_json::json;

use crate::executor::{DiskFileStore, DryRunExecutor, ShellExecutor};
use crate::input::{prefixes, read_input};
use crate::opts::{GlobalOpts, StreamArgs};
use crate::output::print_success;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub stream: StreamArgs,

    /// Project directory; files are read from and written below it
    /// (env: BOLT_WORKDIR)
    #[arg(long, env = "BOLT_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Write files into the workdir and run commands with `sh -c`;
    /// without it nothing touches the disk
    #[arg(long)]
    pub execute: bool,

    /// Load these workdir files into the tree before replaying
    #[arg(long = "seed", value_name = "PATH")]
    pub seed: Vec<String>,

    /// Lock a seeded file against model writes
    #[arg(long = "lock", value_name = "PATH")]
    pub lock: Vec<String>,

    /// Lock every seeded file under a folder
    #[arg(long = "lock-folder", value_name = "PATH")]
    pub lock_folder: Vec<String>,

    /// Commands allowed to run at once (env: BOLT_MAX_CONCURRENT)
    #[arg(long, env = "BOLT_MAX_CONCURRENT", default_value_t = 2)]
    pub max_concurrent: usize,

    /// Per-command timeout in milliseconds (env: BOLT_COMMAND_TIMEOUT_MS)
    #[arg(long, env = "BOLT_COMMAND_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Batch quiet period in milliseconds (env: BOLT_DEBOUNCE_MS)
    #[arg(long, env = "BOLT_DEBOUNCE_MS", default_value_t = 100)]
    pub debounce_ms: u64,

    /// Ignore files and commands outside boltArtifact blocks
    #[arg(long)]
    pub no_markdown: bool,

    /// Tolerate whitespace differences in SEARCH/REPLACE blocks
    /// (env: BOLT_FUZZY_PATCH)
    #[arg(long, env = "BOLT_FUZZY_PATCH")]
    pub fuzzy: bool,
}

impl RunArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            scheduler: SchedulerConfig {
                max_concurrent: self.max_concurrent,
                command_timeout: self.timeout_ms.map(Duration::from_millis),
            },
            batcher: BatcherConfig {
                delay: Duration::from_millis(self.debounce_ms),
                ..BatcherConfig::default()
            },
            classify_markdown: !self.no_markdown,
            fuzzy_patching: self.fuzzy,
            ..PipelineConfig::default()
        }
    }

    fn initial_tree(&self) -> Result<WorkspaceTree> {
        let mut tree = WorkspaceTree::new();
        for seed in &self.seed {
            let path = normalize_path(seed);
            let disk = self.workdir.join(path.trim_start_matches('/'));
            let content = std::fs::read_to_string(&disk)
                .with_context(|| format!("failed to read seed file: {}", disk.display()))?;
            tree.write_file(&path, content)
                .with_context(|| format!("failed to seed {path}"))?;
        }
        for path in &self.lock {
            tree.lock_file(&normalize_path(path))
                .with_context(|| format!("failed to lock {path}"))?;
        }
        for path in &self.lock_folder {
            tree.lock_folder(&normalize_path(path))
                .with_context(|| format!("failed to lock folder {path}"))?;
        }
        Ok(tree)
    }
}

pub async fn cmd_run(opts: &GlobalOpts, args: &RunArgs) -> Result<()> {
    let text = read_input(&args.stream.input)?;
    let tree = args.initial_tree()?;

    let (executor, store): (Arc<dyn CommandExecutor>, Arc<dyn FileStore>) = if args.execute {
        (
            Arc::new(ShellExecutor::new(&args.workdir)),
            Arc::new(DiskFileStore::new(&args.workdir)),
        )
    } else {
        (Arc::new(DryRunExecutor), Arc::new(MemoryFileStore::new()))
    };

    let mut pipeline = ArtifactPipeline::with_tree(args.pipeline_config(), tree, executor, store);
    let (snapshots, mut change_sets) = pipeline.spawn_snapshots();

    let message_id = &args.stream.message_id;
    let mut notices = Vec::new();
    for prefix in prefixes(&text, args.stream.chunk_size) {
        notices.extend(pipeline.ingest(message_id, prefix));
    }
    notices.extend(pipeline.finish_message(message_id, &text));
    pipeline.settle().await;

    let tracker = snapshots.stop().await.context("snapshot loop panicked")?;
    let mut changes = Vec::new();
    while let Ok(change_set) = change_sets.try_recv() {
        changes.extend(change_set.changes);
    }

    let commands = pipeline.scheduler().commands();
    let failed = commands
        .iter()
        .filter(|command| command.status == CommandStatus::Failed)
        .count();
    let mut warnings = Vec::new();
    if !args.execute {
        warnings.push("dry run: no files written, no commands executed (use --execute)".into());
    }
    if failed > 0 {
        warnings.push(format!("{failed} command(s) failed"));
    }

    let data = json!({
        "notices": notices,
        "commands": commands,
        "changes": changes,
        "snapshots": tracker.len(),
    });
    let summary = summarize(&notices, &commands);
    print_success(opts, data, summary, warnings)?;

    if args.execute && failed > 0 {
        anyhow::bail!("{failed} command(s) failed");
    }
    Ok(())
}

fn summarize(notices: &[PipelineNotice], commands: &[Command]) -> String {
    let mut out = String::new();
    for notice in notices {
        let line = match notice {
            PipelineNotice::ArtifactOpened { artifact_id, title } => {
                format!("artifact {artifact_id} \"{title}\"")
            }
            PipelineNotice::ArtifactCompleted { .. } => continue,
            PipelineNotice::FileQueued { path, .. } => format!("  write   {path}"),
            PipelineNotice::CommandQueued { command, .. } => format!("  queue   {command}"),
            PipelineNotice::PatchApplied {
                path,
                touched_line_ranges,
            } => format!("  patch   {path} ({} range(s))", touched_line_ranges.len()),
            PipelineNotice::PatchSkipped { path } => format!("  skip    {path} (patch matched nothing)"),
            PipelineNotice::Rejected { path, locked_by } => {
                format!("  reject  {path} (locked by {locked_by})")
            }
        };
        let _ = writeln!(out, "{line}");
    }
    for command in commands {
        let status = format!("{:?}", command.status).to_lowercase();
        let duration = command.duration_ms.unwrap_or_default();
        let _ = writeln!(out, "[{status}] {} ({duration}ms)", command.text);
    }
    out
}
