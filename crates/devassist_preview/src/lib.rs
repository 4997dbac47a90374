//! # devassist_preview
//!
//! Live previews of generated projects. [`PreviewManager::acquire`] either
//! reuses a recorded port or allocates one, launches the project's dev
//! server in its `current/` directory, records the port in metadata, and
//! waits briefly for it to accept connections.
//!
//! The returned [`PreviewRedirect`] names the proxy path and the
//! `project-router` cookie an external reverse proxy uses to reach the
//! right process.

pub mod error;
pub mod launcher;
pub mod manager;
pub mod port;
pub mod probe;
pub mod registry;

pub use error::{PreviewError, PreviewResult};
pub use launcher::{
    CommandLauncher, LaunchRecord, MockLauncher, MockProcess, PreviewLauncher, ServerProcess,
    DEFAULT_ARGS, DEFAULT_PROGRAM,
};
pub use manager::{
    proxy_location, PreviewManager, PreviewRedirect, PreviewStatus, RoutingCookie, SameSite,
    ROUTING_COOKIE_NAME,
};
pub use port::allocate_port;
pub use probe::{wait_for_port, Readiness, ReadinessConfig};
pub use registry::{PreviewProcess, ProcessRegistry};
