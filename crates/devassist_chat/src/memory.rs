//! Rolling project memory.
//!
//! Before a build or chat reply the recent transcript is compressed into a
//! short memory string. Summarization is best-effort: any failure, or an
//! empty summary, leaves the previous memory untouched.

use std::sync::Arc;

use devassist_sandbox::ProjectId;
use devassist_store::{ChatStore, ChatTurn};
use tracing::{debug, warn};

use crate::services::Summarizer;

/// Turns read from the transcript before trimming.
pub const MEMORY_HISTORY_WINDOW: usize = 120;

/// Turns actually sent to the summarizer.
pub const MEMORY_SUMMARY_TURNS: usize = 40;

/// Instruction given to the summarization model.
pub const MEMORY_INSTRUCTION: &str = "Summarize the project conversation into a short, factual memory for future iterations. \
Capture goals, chosen stack/platform, key decisions, and what has been built so far. \
No fluff. Return plain text only.";

/// Render turns as `ROLE: content` lines.
pub fn render_transcript(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.as_str().to_uppercase(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Computes fresh memory from a project's transcript.
#[derive(Clone)]
pub struct MemorySummarizer {
    chat: ChatStore,
    summarizer: Arc<dyn Summarizer>,
}

impl MemorySummarizer {
    pub fn new(chat: ChatStore, summarizer: Arc<dyn Summarizer>) -> Self {
        Self { chat, summarizer }
    }

    /// Summarize the recent transcript. Returns `previous` unchanged when the
    /// transcript cannot be read, the call fails, or the summary is blank.
    pub async fn refresh(&self, id: &ProjectId, previous: &str) -> String {
        let history = match self.chat.read(id, MEMORY_HISTORY_WINDOW) {
            Ok(history) => history,
            Err(e) => {
                warn!(project_id = %id, error = %e, "Could not read transcript for memory");
                return previous.to_string();
            }
        };
        let start = history.len().saturating_sub(MEMORY_SUMMARY_TURNS);

        match self.summarizer.summarize(&history[start..]).await {
            Ok(summary) if !summary.trim().is_empty() => {
                debug!(project_id = %id, chars = summary.len(), "Memory refreshed");
                summary.trim().to_string()
            }
            Ok(_) => {
                debug!(project_id = %id, "Summarizer returned nothing, keeping memory");
                previous.to_string()
            }
            Err(e) => {
                warn!(project_id = %id, error = %e, "Summarization failed, keeping memory");
                previous.to_string()
            }
        }
    }
}
