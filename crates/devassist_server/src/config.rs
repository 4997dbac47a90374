//! Runtime configuration shared by every subcommand.

use std::path::PathBuf;
use std::time::Duration;

use devassist_preview::{CommandLauncher, PreviewResult, ReadinessConfig, DEFAULT_ARGS, DEFAULT_PROGRAM};

/// Default sandbox root.
pub const DEFAULT_DATA_DIR: &str = "/tmp/sandbox";

/// Default HTTP bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Settings needed to assemble an [`crate::AppState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub preview_program: String,
    pub preview_args: String,
    pub readiness: ReadinessConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            preview_program: DEFAULT_PROGRAM.to_string(),
            preview_args: DEFAULT_ARGS.to_string(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn preview_command(mut self, program: impl Into<String>, args: impl Into<String>) -> Self {
        self.preview_program = program.into();
        self.preview_args = args.into();
        self
    }

    pub fn readiness_millis(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.readiness = self
            .readiness
            .interval(Duration::from_millis(interval_ms))
            .timeout(Duration::from_millis(timeout_ms));
        self
    }

    /// Launcher for the configured dev server command.
    pub fn launcher(&self) -> PreviewResult<CommandLauncher> {
        CommandLauncher::from_command_line(&self.preview_program, &self.preview_args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/sandbox"));
        assert_eq!(config.launcher().unwrap().args_for(3001), vec!["run", "dev", "--", "-p", "3001"]);
        assert_eq!(config.readiness.timeout, Duration::from_secs(8));
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::default()
            .data_dir("/srv/devassist")
            .preview_command("pnpm", "dev --port {port}")
            .readiness_millis(50, 1000);
        assert_eq!(config.launcher().unwrap().program(), "pnpm");
        assert_eq!(config.readiness.interval, Duration::from_millis(50));
        assert_eq!(config.readiness.timeout, Duration::from_secs(1));
    }
}
