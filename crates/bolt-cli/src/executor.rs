//! Collaborators the `run` command plugs into the pipeline.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bolt_runtime::{Command, CommandExecutor, FileStore};

/// Records commands without running them.
pub struct DryRunExecutor;

#[async_trait]
impl CommandExecutor for DryRunExecutor {
    async fn execute(&self, command: &Command) -> Result<String> {
        tracing::info!(command = %command.text, "dry run; command not executed");
        Ok(String::new())
    }
}

/// Runs each command through `sh -c` inside `workdir`.
pub struct ShellExecutor {
    workdir: PathBuf,
}

impl ShellExecutor {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &Command) -> Result<String> {
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&command.text)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{}`", command.text))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            anyhow::bail!("{} ({})", output.status, stderr.trim());
        }
        Ok(format!("{stdout}{stderr}"))
    }
}

/// Writes flushed files below `root`; workspace paths are rooted at `/`.
pub struct DiskFileStore {
    root: PathBuf,
}

impl DiskFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FileStore for DiskFileStore {
    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let target = self.root.join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, content)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        tracing::debug!(path = %target.display(), bytes = content.len(), "file written");
        Ok(())
    }
}
