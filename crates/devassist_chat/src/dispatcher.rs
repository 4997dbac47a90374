//! Conversation dispatcher.
//!
//! Turns one inbound message into one reply. Each turn for a project runs
//! under that project's lock.
//!
//! ```text
//!                    ┌──────────────── no BuildSpec ────────────────┐
//!   message ──► append user turn ──►│ pending?  yes ─► parse answer ─► lock spec │
//!                                   │           no  ─► infer ─┬─► lock spec    │
//!                                   │                         └─► ask question ─┼──► Text
//!                                   └──────────────────────────────────────────────┘
//!                                                │
//!                                    classify_action(message)
//!                               ┌────────────────┼────────────────┐
//!                             Image            Build             Chat
//!                     generate_image   memory ─► generate ─►   memory ─► respond
//!                     record image     normalize ─► write       append reply
//!                     append reply     record_build ─► append
//! ```

use devassist_sandbox::{truncate_chars, ProjectId, SandboxFiles, SandboxPaths};
use devassist_store::{
    BuildCompletion, BuildSpec, ChatStore, ChatTurn, ImageRecord, MetaPatch, MetaStore,
    ProjectLocks, ProjectMeta,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{
    classify_action, infer_platform, parse_platform_answer, Action, CLARIFICATION_QUESTION,
};
use crate::error::{ChatError, ChatResult};
use crate::llm::render_build_spec;
use crate::memory::MemorySummarizer;
use crate::normalize::{build_summary, fallback_scaffold, normalize_files, sanitize_assistant_message};
use crate::services::{ChatContext, ContextTurn, GenerationRequest, Services};

/// Existing files offered to the generator.
pub const SNAPSHOT_MAX_PATHS: usize = 200;

/// Per-file character budget of the snapshot.
pub const SNAPSHOT_MAX_CHARS: usize = 120_000;

/// Transcript turns given to the generator and the chat responder.
pub const CONTEXT_TURNS: usize = 80;

/// File paths listed when grounding a chat reply.
pub const CHAT_FILE_PATHS: usize = 400;

/// Length of the feature summary derived from a build message.
pub const FEATURE_SUMMARY_MAX_CHARS: usize = 80;

/// Transcript text for a generated mockup.
pub const IMAGE_REPLY: &str = "Mockup image generated.";

/// Entry point recorded after a build.
pub const BUILD_ENTRY: &str = "index.html";

/// Error returned for an empty or missing message.
pub const INVALID_PAYLOAD: &str = "Invalid message payload";

/// Outcome of a successful turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatReply {
    Text {
        reply: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        reply: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        image_data_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Build {
        reply: String,
        files_written: Vec<String>,
    },
}

impl ChatReply {
    pub fn reply(&self) -> &str {
        match self {
            Self::Text { reply } | Self::Image { reply, .. } | Self::Build { reply, .. } => reply,
        }
    }
}

/// Routes messages to clarification, image, build or chat handling.
#[derive(Clone)]
pub struct ChatDispatcher {
    files: SandboxFiles,
    meta: MetaStore,
    chat: ChatStore,
    locks: ProjectLocks,
    services: Services,
    memory: MemorySummarizer,
}

impl ChatDispatcher {
    pub fn new(
        files: SandboxFiles,
        meta: MetaStore,
        chat: ChatStore,
        locks: ProjectLocks,
        services: Services,
    ) -> Self {
        let memory = MemorySummarizer::new(chat.clone(), services.summarizer.clone());
        Self {
            files,
            meta,
            chat,
            locks,
            services,
            memory,
        }
    }

    /// Dispatcher with its own stores over `paths`.
    pub fn from_paths(paths: SandboxPaths, services: Services) -> Self {
        Self::new(
            SandboxFiles::new(paths.clone()),
            MetaStore::new(paths.clone()),
            ChatStore::new(paths),
            ProjectLocks::new(),
            services,
        )
    }

    pub fn files(&self) -> &SandboxFiles {
        &self.files
    }

    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    pub fn chat(&self) -> &ChatStore {
        &self.chat
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Handle one user message.
    pub async fn handle(&self, id: &ProjectId, message: &str) -> ChatResult<ChatReply> {
        if message.trim().is_empty() {
            return Err(ChatError::InvalidPayload(INVALID_PAYLOAD.to_string()));
        }

        let _turn = self.locks.lock(id).await;
        self.files.paths().ensure_layout(id)?;
        self.chat.append(id, ChatTurn::user(message))?;

        let meta = self.meta.read_or_default(id)?;
        if meta.build_spec.is_none() {
            if let Some(question) = self.resolve_platform(id, &meta, message)? {
                return Ok(question);
            }
        }

        let action = classify_action(message);
        debug!(project_id = %id, action = action.as_str(), "Message classified");

        match action {
            Action::Image => self.image_turn(id, message).await,
            Action::Build => self.build_turn(id, message).await,
            Action::Chat => self.chat_turn(id).await,
        }
    }

    /// Lock a build spec, or ask the clarification question once.
    fn resolve_platform(
        &self,
        id: &ProjectId,
        meta: &ProjectMeta,
        message: &str,
    ) -> ChatResult<Option<ChatReply>> {
        let pending = meta
            .pending_clarification
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        if let Some(pending) = pending {
            let platform = parse_platform_answer(message).or_web();
            let spec = BuildSpec::lock(platform, meta.app_name(), pending);
            info!(project_id = %id, platform = %platform, "Build spec locked from answer");
            self.meta.lock_build_spec(id, spec)?;
            return Ok(None);
        }

        match infer_platform(message).platform() {
            Some(platform) => {
                let spec = BuildSpec::lock(platform, meta.app_name(), message);
                info!(project_id = %id, platform = %platform, "Build spec locked from first message");
                self.meta.lock_build_spec(id, spec)?;
                Ok(None)
            }
            None => {
                info!(project_id = %id, "Platform unclear, asking once");
                self.meta
                    .patch(id, MetaPatch::new().pending_clarification(message))?;
                self.chat
                    .append(id, ChatTurn::assistant(CLARIFICATION_QUESTION))?;
                Ok(Some(ChatReply::Text {
                    reply: CLARIFICATION_QUESTION.to_string(),
                }))
            }
        }
    }

    async fn image_turn(&self, id: &ProjectId, message: &str) -> ChatResult<ChatReply> {
        let image = match self.services.images.generate_image(message).await {
            Ok(image) if !image.is_empty() => image,
            Ok(_) => return self.image_failed(id, "Image generation returned no url or base64".to_string()),
            Err(ChatError::ImageGeneration(msg)) => return self.image_failed(id, msg),
            Err(e) => return self.image_failed(id, e.to_string()),
        };

        self.meta.record_image(
            id,
            ImageRecord::new(message, image.url.clone(), image.data_url.clone()),
        )?;

        let turn = match &image.url {
            Some(url) => ChatTurn::assistant(IMAGE_REPLY).with_image_url(url.clone()),
            None => ChatTurn::assistant(IMAGE_REPLY),
        };
        self.chat.append(id, turn)?;
        info!(project_id = %id, has_url = image.url.is_some(), "Mockup generated");

        let (image_url, image_data_url) = match image.url {
            Some(url) => (Some(url), None),
            None => (None, image.data_url),
        };
        Ok(ChatReply::Image {
            reply: IMAGE_REPLY.to_string(),
            image_url,
            image_data_url,
        })
    }

    fn image_failed(&self, id: &ProjectId, message: String) -> ChatResult<ChatReply> {
        warn!(project_id = %id, error = %message, "Image generation failed");
        self.chat.append(id, ChatTurn::assistant(message.clone()))?;
        Err(ChatError::ImageGeneration(message))
    }

    async fn build_turn(&self, id: &ProjectId, message: &str) -> ChatResult<ChatReply> {
        let meta = self.meta.read_or_default(id)?;
        let memory = self.memory.refresh(id, meta.memory_text()).await;

        let context = self
            .chat
            .read(id, CONTEXT_TURNS)?
            .iter()
            .map(ContextTurn::from)
            .collect();
        let mut existing_paths = self.files.list_files(id)?;
        existing_paths.truncate(SNAPSHOT_MAX_PATHS);
        let existing_files = self.files.read_snapshot(id, &existing_paths, SNAPSHOT_MAX_CHARS)?;

        let request = GenerationRequest {
            user_message: message.to_string(),
            context,
            existing_files,
            build_spec: meta.build_spec.clone(),
            instructions: build_instructions(&memory, meta.build_spec.as_ref()),
        };

        let result = self
            .services
            .generator
            .generate(&request)
            .await
            .map_err(|e| ChatError::GenerationFailed(e.to_string()))?;

        if !result.ok {
            let reason = result
                .reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| "Build failed".to_string());
            warn!(project_id = %id, reason = %reason, "Generation failed");
            return Err(ChatError::GenerationFailed(reason));
        }

        let mut files = normalize_files(&result.files);
        if files.is_empty() {
            info!(project_id = %id, "Generator returned no files, writing fallback scaffold");
            files = fallback_scaffold(message);
        }

        let report = self.files.write_files(id, &files)?;
        let listing = self.files.list_files(id)?;

        let refreshed = (memory != meta.memory_text()).then_some(memory);
        let updated = self.meta.record_build(
            id,
            BuildCompletion {
                files: listing.clone(),
                feature_summary: feature_summary(message),
                memory: refreshed,
                entry: BUILD_ENTRY.to_string(),
            },
        )?;

        let reply = sanitize_assistant_message(
            result.assistant_message.as_deref(),
            &build_summary(files.len()),
        );
        self.chat.append(id, ChatTurn::assistant(reply.clone()))?;

        info!(
            project_id = %id,
            version = updated.version,
            written = report.written.len(),
            unchanged = report.unchanged.len(),
            total = listing.len(),
            "Build complete"
        );
        Ok(ChatReply::Build {
            reply,
            files_written: listing,
        })
    }

    async fn chat_turn(&self, id: &ProjectId) -> ChatResult<ChatReply> {
        let meta = self.meta.read_or_default(id)?;
        let memory = self.memory.refresh(id, meta.memory_text()).await;
        if memory != meta.memory_text() {
            self.meta.patch(id, MetaPatch::new().memory(memory.clone()))?;
        }

        let mut file_paths = self.files.list_files(id)?;
        file_paths.truncate(CHAT_FILE_PATHS);

        let context = ChatContext {
            build_spec: meta.build_spec,
            memory,
            file_paths,
            history: self.chat.read(id, CONTEXT_TURNS)?,
        };
        let reply = self.services.responder.respond(&context).await?;
        self.chat.append(id, ChatTurn::assistant(reply.clone()))?;

        Ok(ChatReply::Text { reply })
    }
}

/// First line of the message, trimmed and capped for `coreFeatures`.
pub fn feature_summary(message: &str) -> String {
    let first_line = message.trim().lines().next().unwrap_or("").trim();
    truncate_chars(first_line, FEATURE_SUMMARY_MAX_CHARS)
}

/// Generator instructions with memory and build spec as hard constraints.
pub fn build_instructions(memory: &str, spec: Option<&BuildSpec>) -> String {
    let memory = if memory.is_empty() { "(none)" } else { memory };
    format!(
        "You MUST return a non-empty list of files to write to the project folder.\n\
         You MUST build on the CURRENT PROJECT FILES provided (do not reset unless explicitly asked).\n\
         If external services are needed (real-time data, maps, auth, payments):\n\
         - still generate the full scaffold (frontend + backend/proxy + env template + README)\n\
         - do not refuse due to sandbox runtime limitations\n\n\
         Project memory (authoritative):\n{}\n\n\
         Build Info (source of truth; MUST obey):\n{}\n",
        memory,
        render_build_spec(spec)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use devassist_store::Platform;

    #[test]
    fn test_feature_summary() {
        assert_eq!(feature_summary("  Add dark mode\nand more  "), "Add dark mode");
        assert_eq!(feature_summary(&"x".repeat(100)).len(), FEATURE_SUMMARY_MAX_CHARS);
        assert_eq!(feature_summary("   "), "");
    }

    #[test]
    fn test_build_instructions_embed_constraints() {
        let spec = BuildSpec::lock(Platform::Android, "Steps", "A step counter");
        let text = build_instructions("Uses Room", Some(&spec));
        assert!(text.contains("Project memory (authoritative):\nUses Room"));
        assert!(text.contains("\"framework\": \"kotlin\""));
        assert!(text.contains("do not reset unless explicitly asked"));

        let empty = build_instructions("", None);
        assert!(empty.contains("(none)"));
        assert!(empty.contains("(not set yet)"));
    }

    #[test]
    fn test_reply_serialization() {
        let build = ChatReply::Build {
            reply: "Done".into(),
            files_written: vec!["README.md".into()],
        };
        let json = serde_json::to_value(&build).unwrap();
        assert_eq!(json["type"], "build");
        assert_eq!(json["filesWritten"][0], "README.md");

        let image = ChatReply::Image {
            reply: IMAGE_REPLY.into(),
            image_url: None,
            image_data_url: Some("data:image/png;base64,AAA".into()),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "image");
        assert!(json.get("imageUrl").is_none());
        assert_eq!(json["imageDataUrl"], "data:image/png;base64,AAA");
    }
}
