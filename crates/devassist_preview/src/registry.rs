//! In-process registry of running preview processes.
//!
//! Holds at most one handle per project. Nothing here survives a restart,
//! and a registered handle says nothing about whether the process is still
//! alive.

use std::collections::HashMap;
use std::sync::Arc;

use devassist_sandbox::ProjectId;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// A running preview process.
pub trait PreviewProcess: Send {
    /// OS process id, if still known.
    fn pid(&self) -> Option<u32>;

    /// Ask the process to stop. Does not wait for exit.
    fn terminate(&mut self) -> std::io::Result<()>;
}

/// Preview handles keyed by project id.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<Mutex<HashMap<ProjectId, Box<dyn PreviewProcess>>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process, returning the handle it replaced.
    pub fn register(&self, id: ProjectId, process: Box<dyn PreviewProcess>) -> Option<Box<dyn PreviewProcess>> {
        debug!(project_id = %id, pid = ?process.pid(), "Registering preview process");
        self.processes.lock().insert(id, process)
    }

    /// Process id of the registered handle.
    pub fn lookup(&self, id: &ProjectId) -> Option<u32> {
        self.processes.lock().get(id).and_then(|p| p.pid())
    }

    pub fn contains(&self, id: &ProjectId) -> bool {
        self.processes.lock().contains_key(id)
    }

    /// Stop and forget the process for `id`. Returns whether one was registered.
    pub fn terminate(&self, id: &ProjectId) -> bool {
        let removed = self.processes.lock().remove(id);
        match removed {
            Some(mut process) => {
                if let Err(e) = process.terminate() {
                    warn!(project_id = %id, error = %e, "Failed to stop preview process");
                }
                true
            }
            None => false,
        }
    }

    /// Stop every registered process. Returns how many were stopped.
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<_> = self.processes.lock().drain().collect();
        let count = drained.len();
        for (id, mut process) in drained {
            if let Err(e) = process.terminate() {
                warn!(project_id = %id, error = %e, "Failed to stop preview process");
            }
        }
        count
    }

    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRegistry").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::MockProcess;

    fn id(name: &str) -> ProjectId {
        ProjectId::new(name).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ProcessRegistry::new();
        assert!(registry.is_empty());

        assert!(registry.register(id("a"), Box::new(MockProcess::new(10))).is_none());
        assert_eq!(registry.lookup(&id("a")), Some(10));
        assert_eq!(registry.lookup(&id("b")), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_overwrites() {
        let registry = ProcessRegistry::new();
        registry.register(id("a"), Box::new(MockProcess::new(1)));
        let replaced = registry.register(id("a"), Box::new(MockProcess::new(2)));

        assert_eq!(replaced.and_then(|p| p.pid()), Some(1));
        assert_eq!(registry.lookup(&id("a")), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_terminate() {
        let registry = ProcessRegistry::new();
        let process = MockProcess::new(7);
        let stopped = process.terminated_flag();
        registry.register(id("a"), Box::new(process));

        assert!(registry.terminate(&id("a")));
        assert!(stopped.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!registry.contains(&id("a")));
        assert!(!registry.terminate(&id("a")));
    }

    #[test]
    fn test_terminate_all() {
        let registry = ProcessRegistry::new();
        let flags: Vec<_> = (0..3)
            .map(|n| {
                let process = MockProcess::new(n);
                let flag = process.terminated_flag();
                registry.register(id(&format!("p{}", n)), Box::new(process));
                flag
            })
            .collect();

        assert_eq!(registry.terminate_all(), 3);
        assert!(registry.is_empty());
        assert!(flags.iter().all(|f| f.load(std::sync::atomic::Ordering::SeqCst)));
    }
}
