//! Concurrent access to project documents.

use std::sync::Arc;
use std::thread;

use devassist_sandbox::{ProjectId, SandboxPaths};
use devassist_store::{ChatStore, ChatTurn, MetaPatch, MetaStore, MAX_STORED_TURNS};
use tempfile::tempdir;

/// Simultaneous appends to one project keep every turn.
#[test]
fn test_concurrent_appends_lose_nothing() {
    let temp = tempdir().unwrap();
    let store = Arc::new(ChatStore::new(SandboxPaths::new(temp.path())));
    let id = ProjectId::new("busy").unwrap();

    let threads: Vec<_> = (0..8)
        .map(|t| {
            let store = store.clone();
            let id = id.clone();
            thread::spawn(move || {
                for n in 0..5 {
                    store
                        .append(&id, ChatTurn::user(format!("t{}-{}", t, n)))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in threads {
        handle.join().unwrap();
    }

    assert_eq!(store.len(&id).unwrap(), 40);
    assert!(40 <= MAX_STORED_TURNS);
}

/// Simultaneous patches of different fields all survive the merge.
#[test]
fn test_concurrent_patches_merge() {
    let temp = tempdir().unwrap();
    let store = Arc::new(MetaStore::new(SandboxPaths::new(temp.path())));
    let id = ProjectId::new("merge").unwrap();

    let title = {
        let store = store.clone();
        let id = id.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                store.patch(&id, MetaPatch::new().title("Title")).unwrap();
            }
        })
    };
    let memory = {
        let store = store.clone();
        let id = id.clone();
        thread::spawn(move || {
            for _ in 0..20 {
                store.patch(&id, MetaPatch::new().memory("Memory")).unwrap();
            }
        })
    };
    title.join().unwrap();
    memory.join().unwrap();

    let meta = store.read(&id).unwrap().unwrap();
    assert_eq!(meta.title.as_deref(), Some("Title"));
    assert_eq!(meta.memory_text(), "Memory");
    assert_eq!(meta.version, 0);
}
