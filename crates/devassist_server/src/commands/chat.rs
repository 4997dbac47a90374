//! Chat command - run one dispatcher turn locally.

use anyhow::{Context, Result};
use clap::Args;

use devassist_chat::ChatDispatcher;
use devassist_sandbox::{ProjectId, SandboxPaths};
use devassist_server::{reply_envelope, services_from_env};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Project to talk to
    #[arg(short, long)]
    project: String,

    /// Message to send
    message: String,
}

pub async fn execute(global: &GlobalArgs, args: ChatArgs) -> Result<()> {
    let id = ProjectId::new(&args.project)?;
    let dispatcher = ChatDispatcher::from_paths(SandboxPaths::new(&global.data_dir), services_from_env());

    let result = dispatcher.handle(&id, &args.message).await;
    let envelope = reply_envelope(&result);
    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).context("Failed to render reply")?
    );

    result.map(|_| ()).map_err(anyhow::Error::from)
}
