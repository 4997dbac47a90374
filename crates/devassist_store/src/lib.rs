//! # devassist_store
//!
//! Per-project documents owned by the conversation core:
//!
//! - [`MetaStore`]: `meta.json` with the locked [`BuildSpec`], rolling memory,
//!   build version, generated images and preview state.
//! - [`ChatStore`]: `chat.json`, a bounded append-only transcript.
//! - [`ProjectLocks`]: async per-project exclusive sections used by callers
//!   that perform multi-document updates.
//!
//! Both stores guard each read-modify-write with a per-project lock, so
//! concurrent appends and patches are never lost.

pub mod chat;
pub mod error;
pub mod lock;
pub mod meta;

pub use chat::{
    ChatRole, ChatStore, ChatTurn, DEFAULT_READ_LIMIT, MAX_READ_LIMIT, MAX_STORED_TURNS,
    MAX_TURN_CHARS,
};
pub use error::{StoreError, StoreResult};
pub use lock::{DocumentGuards, ProjectLocks};
pub use meta::{
    BuildCompletion, BuildSpec, Framework, ImageRecord, Language, MetaPatch, MetaStore, Platform,
    PreviewState, ProjectMeta, DEFAULT_ONE_LINER, MAX_CORE_FEATURES, MAX_IMAGES,
    ONE_LINER_MAX_CHARS,
};
