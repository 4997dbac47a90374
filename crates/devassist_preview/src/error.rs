//! Error types for the preview manager.

use devassist_sandbox::SandboxError;
use devassist_store::StoreError;
use thiserror::Error;

/// Result type alias for preview operations.
pub type PreviewResult<T> = Result<T, PreviewError>;

/// Errors that can occur while starting a preview.
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("No free port available: {0}")]
    PortUnavailable(#[source] std::io::Error),

    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid preview command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
