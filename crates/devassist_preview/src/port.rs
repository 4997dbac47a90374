//! Ephemeral port allocation.

use tokio::net::TcpListener;
use tracing::debug;

use crate::error::{PreviewError, PreviewResult};

/// Loopback host previews bind to.
pub const PREVIEW_HOST: &str = "127.0.0.1";

/// Ask the OS for a free port by binding port 0, then release it.
///
/// The port is only reserved while the listener lives, so another process
/// could claim it before the preview binds.
pub async fn allocate_port() -> PreviewResult<u16> {
    let listener = TcpListener::bind((PREVIEW_HOST, 0))
        .await
        .map_err(PreviewError::PortUnavailable)?;
    let port = listener
        .local_addr()
        .map_err(PreviewError::PortUnavailable)?
        .port();
    drop(listener);

    debug!(port, "Allocated preview port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_allocated_port_is_bindable() {
        let port = allocate_port().await.unwrap();
        assert_ne!(port, 0);
        let listener = TcpListener::bind((PREVIEW_HOST, port)).await;
        assert!(listener.is_ok());
    }
}
