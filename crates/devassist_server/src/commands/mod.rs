//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use devassist_server::DEFAULT_DATA_DIR;

pub mod chat;
pub mod files;
pub mod serve;

/// devassist - conversational app builder with live previews
#[derive(Parser)]
#[command(name = "devassist")]
#[command(version, about = "devassist - conversational app builder with live previews")]
#[command(long_about = r#"
devassist turns chat messages into generated projects and serves live
previews of them.

COMMANDS:
  serve   → Run the HTTP API (chat + preview endpoints)
  chat    → Run a single chat turn against a project
  files   → List the files generated for a project

ENVIRONMENT:
  OPENAI_API_KEY / ANTHROPIC_API_KEY  enable the hosted model (offline otherwise)
  DEVASSIST_LLM_MODEL                 override the chat/generation model
  DEVASSIST_IMAGE_MODEL               override the image model
  RUST_LOG                            log filter (default: warn,devassist=info)
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "DEVASSIST_LOG_JSON")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Root directory holding all project sandboxes
    #[arg(long, global = true, env = "DEVASSIST_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve(serve::ServeArgs),

    /// Send one message to a project and print the reply envelope
    Chat(chat::ChatArgs),

    /// List a project's generated files
    Files(files::FilesArgs),
}
