//! Scripted service implementations for tests.
//!
//! [`MockServices`] implements every service trait, records each call, and
//! answers from queued responses so dispatcher flows can be exercised
//! without a model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devassist_store::ChatTurn;
use parking_lot::RwLock;

use crate::error::{ChatError, ChatResult};
use crate::services::{
    ChatContext, ChatResponder, CodeGenerator, GeneratedImage, GenerationRequest,
    GenerationResult, ImageGenerator, Summarizer,
};

/// Mock for all four services.
#[derive(Clone)]
pub struct MockServices {
    summary: Arc<RwLock<Result<String, String>>>,
    generations: Arc<RwLock<Vec<GenerationResult>>>,
    generation_index: Arc<AtomicUsize>,
    generation_error: Arc<RwLock<Option<String>>>,
    image: Arc<RwLock<Result<GeneratedImage, String>>>,
    reply: Arc<RwLock<Result<String, String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    summarize_calls: Arc<RwLock<Vec<Vec<ChatTurn>>>>,
    generation_requests: Arc<RwLock<Vec<GenerationRequest>>>,
    image_prompts: Arc<RwLock<Vec<String>>>,
    chat_contexts: Arc<RwLock<Vec<ChatContext>>>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServices {
    /// Summaries fail, generation succeeds with no files, images fail and
    /// chat replies with a fixed string.
    pub fn new() -> Self {
        Self {
            summary: Arc::new(RwLock::new(Err("no summary configured".to_string()))),
            generations: Arc::new(RwLock::new(Vec::new())),
            generation_index: Arc::new(AtomicUsize::new(0)),
            generation_error: Arc::new(RwLock::new(None)),
            image: Arc::new(RwLock::new(Err("no image configured".to_string()))),
            reply: Arc::new(RwLock::new(Ok("Mock reply".to_string()))),
            delay: Arc::new(RwLock::new(None)),
            summarize_calls: Arc::new(RwLock::new(Vec::new())),
            generation_requests: Arc::new(RwLock::new(Vec::new())),
            image_prompts: Arc::new(RwLock::new(Vec::new())),
            chat_contexts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn with_summary(self, summary: impl Into<String>) -> Self {
        *self.summary.write() = Ok(summary.into());
        self
    }

    pub fn fail_summaries(self, message: impl Into<String>) -> Self {
        *self.summary.write() = Err(message.into());
        self
    }

    /// Queue a generation result. Once the queue is exhausted the last
    /// result repeats; with an empty queue generation succeeds with no files.
    pub fn add_generation(self, result: GenerationResult) -> Self {
        self.generations.write().push(result);
        self
    }

    /// Make generation calls return a transport error.
    pub fn fail_generation(self, message: impl Into<String>) -> Self {
        *self.generation_error.write() = Some(message.into());
        self
    }

    pub fn with_image(self, image: GeneratedImage) -> Self {
        *self.image.write() = Ok(image);
        self
    }

    pub fn fail_images(self, message: impl Into<String>) -> Self {
        *self.image.write() = Err(message.into());
        self
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        *self.reply.write() = Ok(reply.into());
        self
    }

    pub fn fail_replies(self, message: impl Into<String>) -> Self {
        *self.reply.write() = Err(message.into());
        self
    }

    /// Delay every call, to widen race windows in concurrency tests.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    pub fn summarize_calls(&self) -> Vec<Vec<ChatTurn>> {
        self.summarize_calls.read().clone()
    }

    pub fn generation_requests(&self) -> Vec<GenerationRequest> {
        self.generation_requests.read().clone()
    }

    pub fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.read().clone()
    }

    pub fn chat_contexts(&self) -> Vec<ChatContext> {
        self.chat_contexts.read().clone()
    }

    async fn pause(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Summarizer for MockServices {
    async fn summarize(&self, turns: &[ChatTurn]) -> ChatResult<String> {
        self.summarize_calls.write().push(turns.to_vec());
        self.pause().await;
        self.summary.read().clone().map_err(ChatError::Summarization)
    }
}

#[async_trait]
impl CodeGenerator for MockServices {
    async fn generate(&self, request: &GenerationRequest) -> ChatResult<GenerationResult> {
        self.generation_requests.write().push(request.clone());
        self.pause().await;

        if let Some(message) = self.generation_error.read().clone() {
            return Err(ChatError::LlmError(message));
        }

        let generations = self.generations.read();
        if generations.is_empty() {
            return Ok(GenerationResult::success(Vec::new()));
        }
        let index = self.generation_index.fetch_add(1, Ordering::SeqCst);
        Ok(generations[index.min(generations.len() - 1)].clone())
    }
}

#[async_trait]
impl ImageGenerator for MockServices {
    async fn generate_image(&self, prompt: &str) -> ChatResult<GeneratedImage> {
        self.image_prompts.write().push(prompt.to_string());
        self.pause().await;
        self.image.read().clone().map_err(ChatError::ImageGeneration)
    }
}

#[async_trait]
impl ChatResponder for MockServices {
    async fn respond(&self, context: &ChatContext) -> ChatResult<String> {
        self.chat_contexts.write().push(context.clone());
        self.pause().await;
        self.reply.read().clone().map_err(ChatError::LlmError)
    }
}
