//! Preview acquisition.
//!
//! ```text
//! acquire(id)
//!   ├─ meta.preview recorded? ──yes──► redirect (no liveness check)
//!   └─ no ─► allocate port ─► ensure layout ─► launch in current/
//!           ─► register handle ─► persist {port, startedAt}
//!           ─► wait for port (Ready | TimedOut) ─► redirect
//! ```

use std::sync::Arc;

use devassist_sandbox::{ProjectId, SandboxPaths};
use devassist_store::{MetaPatch, MetaStore, PreviewState, ProjectLocks};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PreviewResult;
use crate::launcher::PreviewLauncher;
use crate::port::{allocate_port, PREVIEW_HOST};
use crate::probe::{wait_for_port, Readiness, ReadinessConfig};
use crate::registry::ProcessRegistry;

/// Cookie naming the project a reverse proxy should route to.
pub const ROUTING_COOKIE_NAME: &str = "project-router";

/// Proxy path a preview redirects to.
pub fn proxy_location(id: &ProjectId) -> String {
    format!("/preview/{}/next", id)
}

/// SameSite attribute of the routing cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SameSite {
    Lax,
    Strict,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
        }
    }
}

/// The routing cookie set alongside a preview redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub same_site: SameSite,
}

impl RoutingCookie {
    pub fn for_project(id: &ProjectId) -> Self {
        Self {
            name: ROUTING_COOKIE_NAME.to_string(),
            value: id.to_string(),
            path: "/".to_string(),
            same_site: SameSite::Lax,
        }
    }

    /// `Set-Cookie` header value.
    pub fn header_value(&self) -> String {
        format!(
            "{}={}; Path={}; SameSite={}",
            self.name,
            self.value,
            self.path,
            self.same_site.as_str()
        )
    }
}

/// How the preview behind a redirect was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewStatus {
    /// A port was already recorded; nothing was started.
    Reused,
    /// A process was started during this call.
    Started(Readiness),
}

/// Where to send the client and what cookie to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRedirect {
    pub port: u16,
    pub location: String,
    pub cookie: RoutingCookie,
    pub status: PreviewStatus,
}

impl PreviewRedirect {
    fn new(id: &ProjectId, port: u16, status: PreviewStatus) -> Self {
        Self {
            port,
            location: proxy_location(id),
            cookie: RoutingCookie::for_project(id),
            status,
        }
    }
}

/// Starts and tracks one preview process per project.
#[derive(Clone)]
pub struct PreviewManager {
    paths: SandboxPaths,
    meta: MetaStore,
    locks: ProjectLocks,
    registry: ProcessRegistry,
    launcher: Arc<dyn PreviewLauncher>,
    readiness: ReadinessConfig,
}

impl PreviewManager {
    pub fn new(
        paths: SandboxPaths,
        meta: MetaStore,
        locks: ProjectLocks,
        launcher: Arc<dyn PreviewLauncher>,
    ) -> Self {
        Self {
            paths,
            meta,
            locks,
            registry: ProcessRegistry::new(),
            launcher,
            readiness: ReadinessConfig::default(),
        }
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// Return a redirect to the project's preview, starting one if no port
    /// is recorded. A readiness timeout still yields a redirect.
    ///
    /// Reuse never waits on the project lock, so a running chat turn does not
    /// delay the redirect. Starting takes the lock and checks again.
    pub async fn acquire(&self, id: &ProjectId) -> PreviewResult<PreviewRedirect> {
        if let Some(redirect) = self.recorded(id)? {
            return Ok(redirect);
        }

        let _guard = self.locks.lock(id).await;
        if let Some(redirect) = self.recorded(id)? {
            return Ok(redirect);
        }

        let port = allocate_port().await?;
        self.paths.ensure_layout(id)?;
        let workdir = self.paths.current_dir(id);

        let process = self.launcher.launch(&workdir, port)?;
        if let Some(mut previous) = self.registry.register(id.clone(), process) {
            warn!(project_id = %id, pid = ?previous.pid(), "Replacing untracked preview process");
            if let Err(e) = previous.terminate() {
                warn!(project_id = %id, error = %e, "Failed to stop replaced preview process");
            }
        }
        self.meta.patch(id, MetaPatch::new().preview(PreviewState::new(port)))?;

        let readiness = wait_for_port(PREVIEW_HOST, port, &self.readiness).await;
        match readiness {
            Readiness::Ready { elapsed } => {
                info!(project_id = %id, port, elapsed_ms = elapsed.as_millis() as u64, "Preview ready")
            }
            Readiness::TimedOut { .. } => {
                info!(project_id = %id, port, "Preview started, redirecting before it is reachable")
            }
        }

        Ok(PreviewRedirect::new(id, port, PreviewStatus::Started(readiness)))
    }

    fn recorded(&self, id: &ProjectId) -> PreviewResult<Option<PreviewRedirect>> {
        Ok(self.meta.read_or_default(id)?.preview.map(|preview| {
            debug!(project_id = %id, port = preview.port, "Reusing recorded preview port");
            PreviewRedirect::new(id, preview.port, PreviewStatus::Reused)
        }))
    }

    /// Stop every preview this process started.
    pub fn shutdown(&self) -> usize {
        let stopped = self.registry.terminate_all();
        if stopped > 0 {
            info!(count = stopped, "Stopped preview processes");
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_header() {
        let id = ProjectId::new("shop-1").unwrap();
        let cookie = RoutingCookie::for_project(&id);
        assert_eq!(cookie.header_value(), "project-router=shop-1; Path=/; SameSite=Lax");
        assert_eq!(proxy_location(&id), "/preview/shop-1/next");
    }
}
