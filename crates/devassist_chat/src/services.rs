//! Contracts for the external language-model services.
//!
//! The dispatcher only talks to these traits. [`crate::LlmAdapter`] backs
//! them with a hosted model, [`crate::OfflineServices`] without network, and
//! [`crate::mock`] with scripted responses for tests.

use std::sync::Arc;

use async_trait::async_trait;
use devassist_sandbox::SandboxFile;
use devassist_store::{BuildSpec, ChatRole, ChatTurn};
use serde::{Deserialize, Serialize};

use crate::error::ChatResult;

/// One transcript entry handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextTurn {
    pub role: ChatRole,
    pub text: String,
}

impl From<&ChatTurn> for ContextTurn {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            text: turn.content.clone(),
        }
    }
}

/// Input to a code generation call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub user_message: String,
    pub context: Vec<ContextTurn>,
    pub existing_files: Vec<SandboxFile>,
    pub build_spec: Option<BuildSpec>,
    pub instructions: String,
}

/// A file as returned by the generator. Both fields are optional because
/// model output is not trusted to be well formed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedFile {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
        }
    }
}

/// Output of a code generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub ok: bool,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub assistant_message: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl GenerationResult {
    pub fn success(files: Vec<GeneratedFile>) -> Self {
        Self {
            ok: true,
            files,
            ..Default::default()
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.assistant_message = Some(message.into());
        self
    }
}

/// A generated mockup. At least one field is set on success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedImage {
    pub url: Option<String>,
    pub data_url: Option<String>,
}

impl GeneratedImage {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.data_url.is_none()
    }
}

/// Grounding handed to the chat responder.
#[derive(Debug, Clone)]
pub struct ChatContext {
    pub build_spec: Option<BuildSpec>,
    pub memory: String,
    pub file_paths: Vec<String>,
    pub history: Vec<ChatTurn>,
}

/// Compresses a transcript into a short project memory.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, turns: &[ChatTurn]) -> ChatResult<String>;
}

/// Produces candidate files for a build request.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> ChatResult<GenerationResult>;
}

/// Produces a UI mockup image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> ChatResult<GeneratedImage>;
}

/// Answers conversational messages about the project.
#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, context: &ChatContext) -> ChatResult<String>;
}

/// The set of services a dispatcher calls out to.
#[derive(Clone)]
pub struct Services {
    pub summarizer: Arc<dyn Summarizer>,
    pub generator: Arc<dyn CodeGenerator>,
    pub images: Arc<dyn ImageGenerator>,
    pub responder: Arc<dyn ChatResponder>,
}

impl Services {
    /// Use one implementation for every service.
    pub fn from_shared<T>(service: Arc<T>) -> Self
    where
        T: Summarizer + CodeGenerator + ImageGenerator + ChatResponder + 'static,
    {
        Self {
            summarizer: service.clone(),
            generator: service.clone(),
            images: service.clone(),
            responder: service,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_result_tolerates_loose_json() {
        let raw = r#"{"ok": true, "files": [{"path": "a.txt"}, {"content": "x"}, {}]}"#;
        let result: GenerationResult = serde_json::from_str(raw).unwrap();
        assert!(result.ok);
        assert_eq!(result.files.len(), 3);
        assert_eq!(result.files[0].path.as_deref(), Some("a.txt"));
        assert!(result.files[0].content.is_none());
        assert!(result.assistant_message.is_none());
    }

    #[test]
    fn test_failure_carries_reason() {
        let result = GenerationResult::failure("quota exceeded");
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("quota exceeded"));
    }
}
