//! Bounded chat transcript.
//!
//! Stored as one JSON array per project (`chat.json`). Appends rewrite the
//! whole document, keeping only the newest [`MAX_STORED_TURNS`].

use std::fs;

use chrono::{DateTime, Utc};
use devassist_sandbox::{truncate_chars, ProjectId, SandboxPaths};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StoreResult;
use crate::lock::DocumentGuards;

/// Hard cap on stored turns.
pub const MAX_STORED_TURNS: usize = 80;

/// Default number of turns returned by a read.
pub const DEFAULT_READ_LIMIT: usize = 24;

/// Largest suffix a read may request.
pub const MAX_READ_LIMIT: usize = 200;

/// Per-turn content cap applied on read.
pub const MAX_TURN_CHARS: usize = 2000;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_url: Option<String>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            at: Utc::now(),
            image_url: None,
            image_data_url: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Append-only transcript store.
#[derive(Debug, Clone)]
pub struct ChatStore {
    paths: SandboxPaths,
    guards: DocumentGuards,
}

impl ChatStore {
    pub fn new(paths: SandboxPaths) -> Self {
        Self {
            paths,
            guards: DocumentGuards::new(),
        }
    }

    /// Append a turn with a server-assigned timestamp.
    pub fn append(&self, id: &ProjectId, turn: ChatTurn) -> StoreResult<ChatTurn> {
        self.guards.with(id, || {
            let path = self.paths.chat_path(id);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut turns = self.load(id)?;
            let turn = ChatTurn {
                at: Utc::now(),
                ..turn
            };
            turns.push(turn.clone());

            let excess = turns.len().saturating_sub(MAX_STORED_TURNS);
            turns.drain(..excess);

            fs::write(&path, serde_json::to_string_pretty(&turns)?)?;
            debug!(project_id = %id, role = turn.role.as_str(), stored = turns.len(), "Chat turn appended");
            Ok(turn)
        })
    }

    /// The newest `limit` turns (capped at [`MAX_READ_LIMIT`]), oldest first,
    /// each truncated to [`MAX_TURN_CHARS`].
    pub fn read(&self, id: &ProjectId, limit: usize) -> StoreResult<Vec<ChatTurn>> {
        let turns = self.load(id)?;
        let limit = limit.min(MAX_READ_LIMIT);
        let start = turns.len().saturating_sub(limit);

        Ok(turns[start..]
            .iter()
            .cloned()
            .map(|turn| ChatTurn {
                content: truncate_chars(&turn.content, MAX_TURN_CHARS),
                ..turn
            })
            .collect())
    }

    /// Number of stored turns.
    pub fn len(&self, id: &ProjectId) -> StoreResult<usize> {
        Ok(self.load(id)?.len())
    }

    fn load(&self, id: &ProjectId) -> StoreResult<Vec<ChatTurn>> {
        let path = self.paths.chat_path(id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Vec<ChatTurn>>(&content) {
            Ok(turns) => Ok(turns),
            Err(e) => {
                warn!(project_id = %id, error = %e, "Unreadable chat.json, treating as empty");
                Ok(Vec::new())
            }
        }
    }
}
