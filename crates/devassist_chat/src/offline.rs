//! Services used when no LLM key is configured.

use async_trait::async_trait;
use devassist_store::ChatTurn;

use crate::error::{ChatError, ChatResult};
use crate::services::{
    ChatContext, ChatResponder, CodeGenerator, GeneratedImage, GenerationRequest,
    GenerationResult, ImageGenerator, Summarizer,
};

/// Deterministic, network-free stand-ins for every service.
///
/// Builds fall through to the fallback scaffold because generation returns
/// no files; memory is never rewritten.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineServices;

#[async_trait]
impl Summarizer for OfflineServices {
    async fn summarize(&self, _turns: &[ChatTurn]) -> ChatResult<String> {
        Err(ChatError::Summarization("offline mode".to_string()))
    }
}

#[async_trait]
impl CodeGenerator for OfflineServices {
    async fn generate(&self, _request: &GenerationRequest) -> ChatResult<GenerationResult> {
        Ok(GenerationResult::success(Vec::new()))
    }
}

#[async_trait]
impl ImageGenerator for OfflineServices {
    async fn generate_image(&self, _prompt: &str) -> ChatResult<GeneratedImage> {
        Err(ChatError::ImageGeneration(
            "Image generation is unavailable: set OPENAI_API_KEY".to_string(),
        ))
    }
}

#[async_trait]
impl ChatResponder for OfflineServices {
    async fn respond(&self, context: &ChatContext) -> ChatResult<String> {
        let stack = match &context.build_spec {
            Some(spec) => format!(
                "{} is a {} project ({:?}, {:?})",
                spec.app_name, spec.platform, spec.framework, spec.language
            ),
            None => "This project has no build info yet".to_string(),
        };
        Ok(format!(
            "{} with {} file(s). Running offline, so I can build from a scaffold but cannot answer in depth.",
            stack,
            context.file_paths.len()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devassist_store::{BuildSpec, Platform};

    #[tokio::test]
    async fn test_offline_behaviour() {
        let offline = OfflineServices;
        assert!(offline.summarize(&[]).await.is_err());
        assert!(offline.generate_image("a mockup").await.is_err());

        let request = GenerationRequest {
            user_message: "build it".into(),
            context: Vec::new(),
            existing_files: Vec::new(),
            build_spec: None,
            instructions: String::new(),
        };
        let result = offline.generate(&request).await.unwrap();
        assert!(result.ok);
        assert!(result.files.is_empty());
    }

    #[tokio::test]
    async fn test_offline_reply_mentions_project() {
        let context = ChatContext {
            build_spec: Some(BuildSpec::lock(Platform::Ios, "Tides", "Tide tables")),
            memory: String::new(),
            file_paths: vec!["README.md".into(), "App.swift".into()],
            history: Vec::new(),
        };
        let reply = OfflineServices.respond(&context).await.unwrap();
        assert!(reply.starts_with("Tides is a ios project"));
        assert!(reply.contains("2 file(s)"));
    }
}
