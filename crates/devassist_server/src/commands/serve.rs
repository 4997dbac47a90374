//! Serve command - run the HTTP API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use devassist_preview::{DEFAULT_ARGS, DEFAULT_PROGRAM};
use devassist_server::{router, services_from_env, AppConfig, AppState, DEFAULT_BIND};

use super::GlobalArgs;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "DEVASSIST_BIND", default_value = DEFAULT_BIND)]
    bind: String,

    /// Program that starts a project's dev server
    #[arg(long, env = "DEVASSIST_PREVIEW_PROGRAM", default_value = DEFAULT_PROGRAM)]
    preview_program: String,

    /// Dev server arguments; `{port}` is replaced by the allocated port
    #[arg(long, env = "DEVASSIST_PREVIEW_ARGS", default_value = DEFAULT_ARGS, allow_hyphen_values = true)]
    preview_args: String,

    /// Give up waiting for a preview to accept connections after this long
    #[arg(long, env = "DEVASSIST_READINESS_TIMEOUT_MS", default_value_t = 8000)]
    readiness_timeout_ms: u64,

    /// Pause between readiness probes
    #[arg(long, env = "DEVASSIST_READINESS_INTERVAL_MS", default_value_t = 200)]
    readiness_interval_ms: u64,
}

pub async fn execute(global: &GlobalArgs, args: ServeArgs) -> Result<()> {
    let config = AppConfig::default()
        .data_dir(&global.data_dir)
        .preview_command(&args.preview_program, &args.preview_args)
        .readiness_millis(args.readiness_interval_ms, args.readiness_timeout_ms);
    let launcher = config.launcher().context("Invalid preview command")?;

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Cannot create data dir {}", config.data_dir.display()))?;

    let state = AppState::new(&config, services_from_env(), Arc::new(launcher));
    let previews = state.previews.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Cannot bind {}", args.bind))?;
    let local_addr = listener.local_addr()?;

    info!(
        addr = %local_addr,
        data_dir = %config.data_dir.display(),
        preview = %format!("{} {}", config.preview_program, config.preview_args),
        "devassist listening"
    );
    println!("Serving chat API: http://{}/api/project/<id>/chat", local_addr);
    println!("Previews: http://{}/preview/<id>", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    previews.shutdown();
    info!("devassist stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for ctrl-c, serving until killed");
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
