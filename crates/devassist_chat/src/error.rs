//! Error types for the conversation core.

use devassist_sandbox::SandboxError;
use devassist_store::StoreError;
use thiserror::Error;

/// Result type alias for chat operations.
pub type ChatResult<T> = Result<T, ChatError>;

/// Errors surfaced by the dispatcher and its collaborators.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("{0}")]
    GenerationFailed(String),

    #[error("{0}")]
    ImageGeneration(String),

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("LLM not configured. Set OPENAI_API_KEY")]
    LlmNotConfigured,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Whether this error aborts the current action rather than degrading it.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::GenerationFailed(_) => true,
            Self::Sandbox(SandboxError::PathEscape(_)) => true,
            Self::Store(StoreError::Sandbox(SandboxError::PathEscape(_))) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ChatError::GenerationFailed("model refused".into()).is_fatal());
        assert!(ChatError::Sandbox(SandboxError::PathEscape("../x".into())).is_fatal());
        assert!(!ChatError::ImageGeneration("no payload".into()).is_fatal());
        assert!(!ChatError::Summarization("timeout".into()).is_fatal());
        assert!(!ChatError::InvalidPayload("Invalid message payload".into()).is_fatal());
    }

    #[test]
    fn test_user_facing_messages_are_bare() {
        let err = ChatError::GenerationFailed("Build failed".into());
        assert_eq!(err.to_string(), "Build failed");
    }
}
