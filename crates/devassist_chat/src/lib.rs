//! # devassist_chat
//!
//! The conversation core: every inbound chat message passes through
//! [`ChatDispatcher::handle`], which
//!
//! 1. appends the user turn to the transcript,
//! 2. locks a [`devassist_store::BuildSpec`] (asking one platform question if
//!    the first message is ambiguous),
//! 3. routes the message to image, build or chat handling.
//!
//! External model calls sit behind the traits in [`services`]. [`LlmAdapter`]
//! talks to a hosted model, [`OfflineServices`] works without network, and
//! [`mock::MockServices`] scripts responses for tests.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use devassist_chat::{ChatDispatcher, OfflineServices, Services};
//! use devassist_sandbox::{ProjectId, SandboxPaths};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let dispatcher = ChatDispatcher::from_paths(
//!     SandboxPaths::new("/tmp/sandbox"),
//!     Services::from_shared(Arc::new(OfflineServices)),
//! );
//! let id = ProjectId::new("demo")?;
//! let reply = dispatcher.handle(&id, "Build a website for my bakery").await?;
//! println!("{}", reply.reply());
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod dispatcher;
pub mod error;
pub mod llm;
pub mod memory;
pub mod mock;
pub mod normalize;
pub mod offline;
pub mod services;

pub use classify::{
    classify_action, infer_platform, parse_platform_answer, Action, PlatformGuess,
    CLARIFICATION_QUESTION,
};
pub use dispatcher::{ChatDispatcher, ChatReply, INVALID_PAYLOAD};
pub use error::{ChatError, ChatResult};
pub use llm::{LlmAdapter, LlmProvider};
pub use memory::MemorySummarizer;
pub use normalize::{fallback_scaffold, normalize_files, sanitize_assistant_message, FALLBACK_PATHS};
pub use offline::OfflineServices;
pub use services::{
    ChatContext, ChatResponder, CodeGenerator, ContextTurn, GeneratedFile, GeneratedImage,
    GenerationRequest, GenerationResult, ImageGenerator, Services, Summarizer,
};
