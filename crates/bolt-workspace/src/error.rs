use thiserror::Error;

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error("{path} is locked (held by {locked_by})")]
    Locked { path: String, locked_by: String },
    #[error("no entry at {0}")]
    NotFound(String),
    #[error("{0} is not a file")]
    NotAFile(String),
    #[error("{0} is not a folder")]
    NotAFolder(String),
}
