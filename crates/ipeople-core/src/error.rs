//! Error types for the iPeople operations tool.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for dispatcher and backend operations.
pub type PmResult<T> = Result<T, PmError>;

/// Errors surfaced to the operator.
///
/// A declined confirmation is not an error; handlers report it as a
/// cancelled outcome instead.
#[derive(Debug, Error)]
pub enum PmError {
    #[error("iPeople is not installed: {} does not exist", .0.display())]
    DeploymentNotFound(PathBuf),

    #[error("container backend failed: {0}")]
    BackendUnavailable(String),

    #[error("backup failed: {0}")]
    BackupFailed(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
