//! Files command - list a project's generated files.

use anyhow::Result;
use clap::Args;

use devassist_sandbox::{ProjectId, SandboxFiles, SandboxPaths};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct FilesArgs {
    /// Project whose sandbox to list
    #[arg(short, long)]
    project: String,
}

pub fn execute(global: &GlobalArgs, args: FilesArgs) -> Result<()> {
    let id = ProjectId::new(&args.project)?;
    let files = SandboxFiles::new(SandboxPaths::new(&global.data_dir)).list_files(&id)?;

    if files.is_empty() {
        println!("No files in project {}", id);
    }
    for path in files {
        println!("{}", path);
    }
    Ok(())
}
