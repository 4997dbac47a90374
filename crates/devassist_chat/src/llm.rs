//! LLM adapter backing the service traits.
//!
//! Supports OpenAI and Anthropic chat APIs, selected via environment
//! variables. Image generation is OpenAI-only.

use async_trait::async_trait;
use devassist_store::ChatTurn;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ChatError, ChatResult};
use crate::memory::{render_transcript, MEMORY_INSTRUCTION};
use crate::services::{
    ChatContext, ChatResponder, CodeGenerator, GeneratedImage, GenerationRequest,
    GenerationResult, ImageGenerator, Summarizer,
};

/// Retries for transient errors (5xx, rate limits, network issues).
const MAX_RETRIES: u32 = 3;

/// System prompt for conversational replies.
pub const CHAT_PERSONA: &str = "You are Devassist, the AI builder running inside THIS project. \
Answer questions using the project's Build Info, memory, and file tree. \
Do NOT say you are ChatGPT or a general-purpose assistant. Be concise and practical. \
Never change platform/language/framework/app name unless the user explicitly asks.";

/// System prompt for code generation.
pub const GENERATOR_PERSONA: &str = "You are Devassist, a code generator. \
Reply with a single JSON object and nothing else: \
{\"files\": [{\"path\": \"relative/path\", \"content\": \"full file content\"}], \
\"assistantMessage\": \"one or two plain sentences describing what changed\"}.";

/// LLM provider type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Anthropic,
}

/// LLM adapter that handles API calls
pub struct LlmAdapter {
    provider: LlmProvider,
    api_key: String,
    model: String,
    image_model: String,
    client: reqwest::Client,
}

/// A role-tagged message sent to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: &'static str,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }

    fn from_turn(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: turn.content.clone(),
        }
    }
}

impl LlmAdapter {
    /// Create a new LLM adapter with explicit configuration
    pub fn new(provider: LlmProvider, api_key: String, model: Option<String>) -> Self {
        let default_model = match provider {
            LlmProvider::OpenAI => "gpt-5-mini".to_string(),
            LlmProvider::Anthropic => "claude-sonnet-4.5".to_string(),
        };

        Self {
            provider,
            api_key,
            model: model.unwrap_or(default_model),
            image_model: "gpt-image-1".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create an LLM adapter from environment variables
    ///
    /// Checks in order:
    /// 1. OPENAI_API_KEY
    /// 2. ANTHROPIC_API_KEY
    ///
    /// `DEVASSIST_LLM_MODEL` and `DEVASSIST_IMAGE_MODEL` override the models.
    pub fn from_env() -> ChatResult<Self> {
        let custom_model = std::env::var("DEVASSIST_LLM_MODEL").ok().filter(|m| !m.is_empty());
        let image_model = std::env::var("DEVASSIST_IMAGE_MODEL").ok().filter(|m| !m.is_empty());

        let adapter = if let Some(api_key) = non_empty_env("OPENAI_API_KEY") {
            Self::new(LlmProvider::OpenAI, api_key, custom_model)
        } else if let Some(api_key) = non_empty_env("ANTHROPIC_API_KEY") {
            Self::new(LlmProvider::Anthropic, api_key, custom_model)
        } else {
            return Err(ChatError::LlmNotConfigured);
        };

        Ok(match image_model {
            Some(model) => adapter.with_image_model(model),
            None => adapter,
        })
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    /// Get the current provider
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Get the current model
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Complete a conversation with the LLM
    pub async fn complete(&self, messages: &[LlmMessage]) -> ChatResult<String> {
        match self.provider {
            LlmProvider::OpenAI => self.complete_openai(messages).await,
            LlmProvider::Anthropic => self.complete_anthropic(messages).await,
        }
    }

    async fn complete_openai(&self, messages: &[LlmMessage]) -> ChatResult<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            max_completion_tokens: Some(8192),
        };

        let result: OpenAIResponse = self
            .post_with_retry("OpenAI", "https://api.openai.com/v1/chat/completions", &request)
            .await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ChatError::LlmError("No response from OpenAI".to_string()))
    }

    async fn complete_anthropic(&self, messages: &[LlmMessage]) -> ChatResult<String> {
        // Anthropic takes system prompts separately
        let system = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: 8192,
            system: (!system.is_empty()).then_some(system),
            messages: messages.iter().filter(|m| m.role != "system").cloned().collect(),
        };

        let result: AnthropicResponse = self
            .post_with_retry("Anthropic", "https://api.anthropic.com/v1/messages", &request)
            .await?;

        result
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ChatError::LlmError("No response from Anthropic".to_string()))
    }

    async fn post_with_retry<Req, Resp>(&self, provider: &str, url: &str, body: &Req) -> ChatResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 2s, 4s
                let delay = std::time::Duration::from_secs(1 << attempt);
                tokio::time::sleep(delay).await;
            }

            let mut builder = self.client.post(url).header("Content-Type", "application/json");
            builder = match self.provider {
                LlmProvider::OpenAI => builder.header("Authorization", format!("Bearer {}", self.api_key)),
                LlmProvider::Anthropic => builder
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", "2023-06-01"),
            };

            let response = match builder.json(body).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!(provider, attempt = attempt + 1, error = %e, "LLM request failed");
                    last_error = Some(ChatError::LlmError(format!("Network error: {}", e)));
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() || status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(ChatError::LlmError(format!(
                    "{} API error {} (attempt {}/{}): {}",
                    provider,
                    status,
                    attempt + 1,
                    MAX_RETRIES,
                    body
                )));
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ChatError::LlmError(format!("{} API error {}: {}", provider, status, body)));
            }

            return response
                .json()
                .await
                .map_err(|e| ChatError::LlmError(format!("Failed to parse response: {}", e)));
        }

        Err(last_error.unwrap_or_else(|| ChatError::LlmError("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl Summarizer for LlmAdapter {
    async fn summarize(&self, turns: &[ChatTurn]) -> ChatResult<String> {
        let messages = [
            LlmMessage::system(MEMORY_INSTRUCTION),
            LlmMessage::user(render_transcript(turns)),
        ];
        self.complete(&messages)
            .await
            .map(|summary| summary.trim().to_string())
            .map_err(|e| ChatError::Summarization(e.to_string()))
    }
}

#[async_trait]
impl CodeGenerator for LlmAdapter {
    async fn generate(&self, request: &GenerationRequest) -> ChatResult<GenerationResult> {
        let mut messages = vec![
            LlmMessage::system(GENERATOR_PERSONA),
            LlmMessage::system(request.instructions.clone()),
        ];
        if !request.existing_files.is_empty() {
            let files = request
                .existing_files
                .iter()
                .map(|f| format!("--- {} ---\n{}", f.path, f.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            messages.push(LlmMessage::system(format!("CURRENT PROJECT FILES:\n{}", files)));
        }
        messages.extend(request.context.iter().map(|turn| LlmMessage {
            role: turn.role.as_str(),
            content: turn.text.clone(),
        }));
        messages.push(LlmMessage::user(request.user_message.clone()));

        let raw = self.complete(&messages).await?;
        debug!(chars = raw.len(), "Generator responded");
        Ok(parse_generation(&raw))
    }
}

#[async_trait]
impl ImageGenerator for LlmAdapter {
    async fn generate_image(&self, prompt: &str) -> ChatResult<GeneratedImage> {
        if self.provider != LlmProvider::OpenAI {
            return Err(ChatError::ImageGeneration(
                "Image generation requires OPENAI_API_KEY".to_string(),
            ));
        }

        let request = OpenAIImageRequest {
            model: self.image_model.clone(),
            prompt: mockup_prompt(prompt),
            size: "1024x1024".to_string(),
        };
        let result: OpenAIImageResponse = self
            .post_with_retry("OpenAI", "https://api.openai.com/v1/images/generations", &request)
            .await
            .map_err(|e| ChatError::ImageGeneration(e.to_string()))?;

        let first = result.data.into_iter().next().unwrap_or_default();
        let image = GeneratedImage {
            url: first.url.filter(|u| !u.is_empty()),
            data_url: first
                .b64_json
                .filter(|b| !b.is_empty())
                .map(|b64| format!("data:image/png;base64,{}", b64)),
        };

        if image.is_empty() {
            return Err(ChatError::ImageGeneration(
                "Image generation returned no url or base64".to_string(),
            ));
        }
        Ok(image)
    }
}

#[async_trait]
impl ChatResponder for LlmAdapter {
    async fn respond(&self, context: &ChatContext) -> ChatResult<String> {
        let mut messages = grounding_messages(context);
        messages.extend(context.history.iter().map(LlmMessage::from_turn));
        self.complete(&messages).await
    }
}

/// System messages grounding a chat reply in the project's state.
pub fn grounding_messages(context: &ChatContext) -> Vec<LlmMessage> {
    let files = if context.file_paths.is_empty() {
        "(no files yet)".to_string()
    } else {
        context
            .file_paths
            .iter()
            .map(|p| format!("- {}", p))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut messages = vec![
        LlmMessage::system(CHAT_PERSONA),
        LlmMessage::system(format!("Project files (authoritative paths):\n{}", files)),
        LlmMessage::system(format!(
            "Build Info (source of truth; MUST obey):\n{}",
            render_build_spec(context.build_spec.as_ref())
        )),
    ];
    if !context.memory.is_empty() {
        messages.push(LlmMessage::system(format!(
            "Project memory (authoritative):\n{}",
            context.memory
        )));
    }
    messages
}

/// Pretty JSON of a build spec, or a placeholder when none is locked.
pub fn render_build_spec(spec: Option<&devassist_store::BuildSpec>) -> String {
    spec.and_then(|s| serde_json::to_string_pretty(s).ok())
        .unwrap_or_else(|| "(not set yet)".to_string())
}

fn mockup_prompt(request: &str) -> String {
    format!(
        "You are a senior product designer.\n\n\
         Create a high-fidelity, modern SaaS UI mockup based on this request:\n\n\
         {}\n\n\
         Constraints:\n\
         - realistic product UI\n\
         - clean typography\n\
         - neutral background\n\
         - professional SaaS style\n",
        request
    )
}

/// Parse model output into a generation result, tolerating code fences and
/// prose around the JSON object.
pub fn parse_generation(raw: &str) -> GenerationResult {
    let trimmed = raw.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return GenerationResult::failure("Model returned no JSON payload"),
    };

    match serde_json::from_str::<GenerationPayload>(json) {
        Ok(payload) => GenerationResult {
            ok: true,
            files: payload.files,
            assistant_message: payload.assistant_message,
            reason: None,
        },
        Err(e) => GenerationResult::failure(format!("Model returned invalid JSON: {}", e)),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationPayload {
    #[serde(default)]
    files: Vec<crate::services::GeneratedFile>,
    #[serde(default)]
    assistant_message: Option<String>,
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<LlmMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIImageRequest {
    model: String,
    prompt: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIImageResponse {
    #[serde(default)]
    data: Vec<OpenAIImageData>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIImageData {
    url: Option<String>,
    b64_json: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<LlmMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use devassist_store::{BuildSpec, Platform};

    #[test]
    fn test_default_models() {
        let openai = LlmAdapter::new(LlmProvider::OpenAI, "key".to_string(), None);
        assert_eq!(openai.model(), "gpt-5-mini");
        assert_eq!(openai.image_model(), "gpt-image-1");

        let anthropic = LlmAdapter::new(LlmProvider::Anthropic, "key".to_string(), None);
        assert_eq!(anthropic.model(), "claude-sonnet-4.5");
    }

    #[test]
    fn test_custom_model() {
        let adapter = LlmAdapter::new(LlmProvider::OpenAI, "key".to_string(), Some("gpt-4.1".to_string()))
            .with_image_model("dall-e-3");
        assert_eq!(adapter.model(), "gpt-4.1");
        assert_eq!(adapter.image_model(), "dall-e-3");
    }

    #[test]
    fn test_parse_generation_with_fences() {
        let raw = "```json\n{\"files\": [{\"path\": \"index.html\", \"content\": \"<h1>Hi</h1>\"}], \"assistantMessage\": \"Added a landing page.\"}\n```";
        let result = parse_generation(raw);
        assert!(result.ok);
        assert_eq!(result.files.len(), 1);
        assert_eq!(result.files[0].path.as_deref(), Some("index.html"));
        assert_eq!(result.assistant_message.as_deref(), Some("Added a landing page."));
    }

    #[test]
    fn test_parse_generation_rejects_prose() {
        let result = parse_generation("Sorry, I can't help with that.");
        assert!(!result.ok);
        assert!(result.reason.is_some());
    }

    #[test]
    fn test_grounding_messages() {
        let context = ChatContext {
            build_spec: Some(BuildSpec::lock(Platform::Web, "Notes", "A notes app")),
            memory: String::new(),
            file_paths: vec!["README.md".to_string()],
            history: vec![ChatTurn::user("hi")],
        };
        let messages = grounding_messages(&context);
        assert_eq!(messages.len(), 3);
        assert!(messages[1].content.contains("- README.md"));
        assert!(messages[2].content.contains("\"platform\": \"web\""));

        let with_memory = ChatContext { memory: "Uses Next.js".into(), ..context };
        assert_eq!(grounding_messages(&with_memory).len(), 4);
    }

    #[test]
    fn test_render_missing_spec() {
        assert_eq!(render_build_spec(None), "(not set yet)");
    }
}
