//! # devassist_server
//!
//! HTTP surface and process wiring for devassist. The `devassist` binary
//! parses configuration, initializes logging and serves [`api::router`].

pub mod api;
pub mod config;
pub mod state;

pub use api::{extract_message, reply_envelope, router};
pub use config::{AppConfig, DEFAULT_BIND, DEFAULT_DATA_DIR};
pub use state::{services_from_env, AppState};
