//! devassist CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Chat turn failed

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const CHAT_FAILURE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let result = match cli.command {
        Commands::Serve(args) => commands::serve::execute(&cli.global, args).await,
        Commands::Chat(args) => commands::chat::execute(&cli.global, args).await,
        Commands::Files(args) => commands::files::execute(&cli.global, args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,devassist=info"));
    let (plain, json) = if json {
        (None, Some(fmt::layer().json().with_target(false)))
    } else {
        (Some(fmt::layer().with_target(false)), None)
    };

    // Already initialized in tests or embedding; keep going
    let _ = tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<devassist_sandbox::SandboxError>().is_some() {
        return ExitCodes::INVALID_ARGS;
    }
    if e.downcast_ref::<devassist_chat::ChatError>().is_some() {
        return ExitCodes::CHAT_FAILURE;
    }
    ExitCodes::GENERAL_ERROR
}
