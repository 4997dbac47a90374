//! Readiness polling for a freshly spawned preview.

use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Poll timing for [`wait_for_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Pause between connect attempts
    pub interval: Duration,
    /// Total time to wait before giving up
    pub timeout: Duration,
    /// Budget for a single connect attempt
    pub connect_timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            timeout: Duration::from_millis(8000),
            connect_timeout: Duration::from_millis(800),
        }
    }
}

impl ReadinessConfig {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Outcome of a readiness wait. Neither variant is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready { elapsed: Duration },
    TimedOut { waited: Duration },
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Poll `host:port` until a TCP connect succeeds or the timeout passes.
pub async fn wait_for_port(host: &str, port: u16, config: &ReadinessConfig) -> Readiness {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let connect = tokio::time::timeout(config.connect_timeout, TcpStream::connect((host, port))).await;
        if let Ok(Ok(_stream)) = connect {
            let elapsed = start.elapsed();
            debug!(port, attempts, elapsed_ms = elapsed.as_millis() as u64, "Preview port reachable");
            return Readiness::Ready { elapsed };
        }

        if start.elapsed() >= config.timeout {
            let waited = start.elapsed();
            warn!(port, attempts, waited_ms = waited.as_millis() as u64, "Preview not reachable yet, continuing");
            return Readiness::TimedOut { waited };
        }
        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast() -> ReadinessConfig {
        ReadinessConfig::default()
            .interval(Duration::from_millis(10))
            .timeout(Duration::from_millis(150))
    }

    #[test]
    fn test_default_timing() {
        let config = ReadinessConfig::default();
        assert_eq!(config.interval, Duration::from_millis(200));
        assert_eq!(config.timeout, Duration::from_secs(8));
        assert_eq!(config.connect_timeout, Duration::from_millis(800));
    }

    #[tokio::test]
    async fn test_ready_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let readiness = wait_for_port("127.0.0.1", port, &fast()).await;
        assert!(readiness.is_ready());
    }

    #[tokio::test]
    async fn test_times_out_when_nothing_listens() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let readiness = wait_for_port("127.0.0.1", port, &fast()).await;
        assert!(matches!(readiness, Readiness::TimedOut { waited } if waited >= Duration::from_millis(150)));
    }

    #[tokio::test]
    async fn test_becomes_ready_after_late_bind() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let server = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(listener);
        });

        let config = ReadinessConfig::default()
            .interval(Duration::from_millis(10))
            .timeout(Duration::from_secs(2));
        assert!(wait_for_port("127.0.0.1", port, &config).await.is_ready());
        server.abort();
    }
}
