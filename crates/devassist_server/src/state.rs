//! Shared application state.

use std::sync::Arc;

use devassist_chat::{ChatDispatcher, LlmAdapter, OfflineServices, Services};
use devassist_preview::{PreviewLauncher, PreviewManager};
use devassist_sandbox::{SandboxFiles, SandboxPaths};
use devassist_store::{ChatStore, MetaStore, ProjectLocks};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Everything a request handler needs. Stores and locks are shared between
/// the dispatcher and the preview manager.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ChatDispatcher>,
    pub previews: Arc<PreviewManager>,
}

impl AppState {
    pub fn new(config: &AppConfig, services: Services, launcher: Arc<dyn PreviewLauncher>) -> Self {
        let paths = SandboxPaths::new(&config.data_dir);
        let meta = MetaStore::new(paths.clone());
        let locks = ProjectLocks::new();

        let dispatcher = ChatDispatcher::new(
            SandboxFiles::new(paths.clone()),
            meta.clone(),
            ChatStore::new(paths.clone()),
            locks.clone(),
            services,
        );
        let previews = PreviewManager::new(paths, meta, locks, launcher).with_readiness(config.readiness);

        Self {
            dispatcher: Arc::new(dispatcher),
            previews: Arc::new(previews),
        }
    }
}

/// LLM-backed services when a key is configured, offline ones otherwise.
pub fn services_from_env() -> Services {
    match LlmAdapter::from_env() {
        Ok(adapter) => {
            info!(provider = ?adapter.provider(), model = adapter.model(), "Using LLM services");
            Services::from_shared(Arc::new(adapter))
        }
        Err(e) => {
            warn!(error = %e, "No LLM configured, running offline");
            Services::from_shared(Arc::new(OfflineServices))
        }
    }
}
