use std::path::PathBuf;
use thiserror::Error;

/// Error types shared across the toolkit's operational modules
#[derive(Debug, Error)]
pub enum OpsError {
    #[error("required tool not found on PATH: {0}")]
    ToolMissing(String),

    #[error("{tool} exited with status {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("failed to spawn {tool}: {source}")]
    SpawnError {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database unreachable: {0}")]
    DatabaseUnreachable(String),

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("invalid backup archive: {0}")]
    InvalidBackup(String),

    #[error("model artifacts missing from {}", .0.display())]
    ModelsMissing(PathBuf),

    #[error("model artifact corrupt: {0}")]
    ModelCorrupt(String),
}

impl OpsError {
    /// Whether the failure points at an external collaborator rather than
    /// this toolkit's own state.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            OpsError::ToolMissing(_)
                | OpsError::ToolFailed { .. }
                | OpsError::SpawnError { .. }
                | OpsError::DatabaseUnreachable(_)
        )
    }
}
