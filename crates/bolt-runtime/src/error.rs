use std::time::Duration;

use bolt_workspace::WorkspaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("executor error: {0}")]
    Executor(String),
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    #[error("batch handler error: {0}")]
    Handler(String),
}
