//! Per-project mutual exclusion.
//!
//! Two layers are provided:
//! - [`ProjectLocks`]: async, held for a whole request (a chat turn or a
//!   preview acquisition) so requests for one project run one at a time.
//! - [`DocumentGuards`]: short synchronous sections around a single
//!   read-modify-write of one document.
//!
//! They use separate maps, so holding a project lock while a store takes its
//! document guard cannot deadlock. Entries nobody holds or waits on are
//! dropped whenever a new guard is handed out, so the maps only track
//! projects with activity in flight.

use std::collections::HashMap;
use std::sync::Arc;

use devassist_sandbox::ProjectId;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Async exclusive sections keyed by project id.
#[derive(Debug, Default, Clone)]
pub struct ProjectLocks {
    locks: Arc<Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn lock(&self, id: &ProjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            prune_idle(&mut locks);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of projects currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronous per-project guards for document read-modify-write.
#[derive(Debug, Default, Clone)]
pub struct DocumentGuards {
    guards: Arc<Mutex<HashMap<ProjectId, Arc<Mutex<()>>>>>,
}

impl DocumentGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the guard for `id`.
    pub fn with<T>(&self, id: &ProjectId, f: impl FnOnce() -> T) -> T {
        let guard = {
            let mut guards = self.guards.lock();
            prune_idle(&mut guards);
            guards.entry(id.clone()).or_default().clone()
        };
        let _held = guard.lock();
        f()
    }

    /// Number of projects currently tracked.
    pub fn len(&self) -> usize {
        self.guards.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop entries only the map still references.
fn prune_idle<T>(map: &mut HashMap<ProjectId, Arc<T>>) {
    map.retain(|_, entry| Arc::strong_count(entry) > 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_project_is_serialized() {
        let locks = ProjectLocks::new();
        let id = ProjectId::new("p").unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let id = id.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&id).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 1);
    }

    #[tokio::test]
    async fn test_different_projects_are_independent() {
        let locks = ProjectLocks::new();
        let a = ProjectId::new("a").unwrap();
        let b = ProjectId::new("b").unwrap();

        let _held_a = locks.lock(&a).await;
        let acquired_b = tokio::time::timeout(Duration::from_millis(200), locks.lock(&b)).await;
        assert!(acquired_b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = ProjectLocks::new();
        let a = ProjectId::new("a").unwrap();
        let held_a = locks.lock(&a).await;

        for n in 0..50 {
            let _guard = locks.lock(&ProjectId::new(format!("p{}", n)).unwrap()).await;
        }
        // Only the held lock and the most recent one remain
        assert_eq!(locks.len(), 2);

        // A held lock is never replaced
        let again = tokio::time::timeout(Duration::from_millis(50), locks.lock(&a)).await;
        assert!(again.is_err());

        drop(held_a);
        let _b = locks.lock(&ProjectId::new("b").unwrap()).await;
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_idle_document_guards_are_pruned() {
        let guards = DocumentGuards::new();
        for n in 0..20 {
            guards.with(&ProjectId::new(format!("p{}", n)).unwrap(), || ());
        }
        assert_eq!(guards.len(), 1);
    }

    #[test]
    fn test_document_guard_returns_value() {
        let guards = DocumentGuards::new();
        let id = ProjectId::new("p").unwrap();
        assert_eq!(guards.with(&id, || 41 + 1), 42);
    }
}
