//! Starting a project's development server.
//!
//! [`CommandLauncher`] runs a configured command (by default
//! `npm run dev -- -p {port}`) inside the project's `current/` directory.
//! [`MockLauncher`] records launches for tests and can hold a listener on the
//! port to look like a live server.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::{PreviewError, PreviewResult};
use crate::port::PREVIEW_HOST;
use crate::registry::PreviewProcess;

/// Placeholder replaced by the allocated port in command arguments.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Default development server program.
pub const DEFAULT_PROGRAM: &str = "npm";

/// Default development server arguments.
pub const DEFAULT_ARGS: &str = "run dev -- -p {port}";

/// Spawns a preview server for a project directory.
pub trait PreviewLauncher: Send + Sync {
    fn launch(&self, workdir: &Path, port: u16) -> PreviewResult<Box<dyn PreviewProcess>>;
}

/// Launches a real process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl Default for CommandLauncher {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: split_args(DEFAULT_ARGS),
        }
    }
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> PreviewResult<Self> {
        let program = program.into();
        if program.trim().is_empty() {
            return Err(PreviewError::InvalidCommand("program is empty".to_string()));
        }
        Ok(Self { program, args })
    }

    /// Build from a program and a whitespace-separated argument string.
    pub fn from_command_line(program: impl Into<String>, args: &str) -> PreviewResult<Self> {
        Self::new(program, split_args(args))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments with the port substituted.
    pub fn args_for(&self, port: u16) -> Vec<String> {
        let port = port.to_string();
        self.args.iter().map(|a| a.replace(PORT_PLACEHOLDER, &port)).collect()
    }
}

impl PreviewLauncher for CommandLauncher {
    fn launch(&self, workdir: &Path, port: u16) -> PreviewResult<Box<dyn PreviewProcess>> {
        let args = self.args_for(port);
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .current_dir(workdir)
            .env("PORT", port.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        // Own process group: terminal signals skip it and termination reaches
        // whatever the command forks
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn().map_err(|source| PreviewError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        info!(
            program = %self.program,
            args = ?args,
            port,
            pid = ?child.id(),
            workdir = %workdir.display(),
            "Preview process spawned"
        );
        Ok(Box::new(ServerProcess::new(child)))
    }
}

/// A dev server spawned by [`CommandLauncher`], leading its own process group.
///
/// Terminating (or dropping) it signals the whole group, so servers forked by
/// wrappers such as `npm run` stop with it.
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    stopped: bool,
}

impl ServerProcess {
    fn new(child: Child) -> Self {
        Self { child, stopped: false }
    }

    #[cfg(unix)]
    fn signal_group(&self) -> std::io::Result<()> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        let pgid = libc::pid_t::try_from(pid)
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;

        // SAFETY: kill(2) takes plain integers and touches no memory of ours.
        let rc = unsafe { libc::kill(-pgid, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(())
        } else {
            Err(err)
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl PreviewProcess for ServerProcess {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.stopped = true;
        let group = self.signal_group();
        let leader = self.child.start_kill();
        group.and(leader)
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if !self.stopped {
            if let Err(e) = self.terminate() {
                warn!(pid = ?self.child.id(), error = %e, "Failed to stop preview process group");
            }
        }
    }
}

fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Stand-in process for tests.
#[derive(Debug)]
pub struct MockProcess {
    pid: u32,
    terminated: Arc<AtomicBool>,
    listener: Option<TcpListener>,
}

impl MockProcess {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            terminated: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }

    /// Flag set once the process is terminated.
    pub fn terminated_flag(&self) -> Arc<AtomicBool> {
        self.terminated.clone()
    }
}

impl PreviewProcess for MockProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn terminate(&mut self) -> std::io::Result<()> {
        self.terminated.store(true, Ordering::SeqCst);
        self.listener = None;
        Ok(())
    }
}

/// A recorded launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub workdir: PathBuf,
    pub port: u16,
}

/// Launcher that records calls instead of spawning.
#[derive(Clone, Default)]
pub struct MockLauncher {
    launches: Arc<RwLock<Vec<LaunchRecord>>>,
    listen: Arc<AtomicBool>,
    failure: Arc<RwLock<Option<String>>>,
    terminated: Arc<RwLock<Vec<Arc<AtomicBool>>>>,
}

impl MockLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the allocated port on launch so readiness succeeds at once.
    pub fn listening(self) -> Self {
        self.listen.store(true, Ordering::SeqCst);
        self
    }

    /// Fail every launch with a spawn error.
    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.failure.write() = Some(message.into());
        self
    }

    pub fn launches(&self) -> Vec<LaunchRecord> {
        self.launches.read().clone()
    }

    /// Termination flags of launched processes, in launch order.
    pub fn terminated(&self) -> Vec<bool> {
        self.terminated
            .read()
            .iter()
            .map(|flag| flag.load(Ordering::SeqCst))
            .collect()
    }
}

impl PreviewLauncher for MockLauncher {
    fn launch(&self, workdir: &Path, port: u16) -> PreviewResult<Box<dyn PreviewProcess>> {
        if let Some(message) = self.failure.read().clone() {
            return Err(PreviewError::Spawn {
                program: "mock".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            });
        }

        let mut launches = self.launches.write();
        launches.push(LaunchRecord {
            workdir: workdir.to_path_buf(),
            port,
        });

        let mut process = MockProcess::new(launches.len() as u32);
        if self.listen.load(Ordering::SeqCst) {
            process.listener = Some(TcpListener::bind((PREVIEW_HOST, port))?);
        }
        self.terminated.write().push(process.terminated_flag());
        Ok(Box::new(process))
    }
}
