//! Integration tests for the sandbox file store.

use std::fs;

use devassist_sandbox::{ProjectId, SandboxError, SandboxFile, SandboxFiles, SandboxPaths};
use tempfile::tempdir;

/// Traversal never lands outside the project's working directory.
#[test]
fn test_traversal_never_writes_outside_current() {
    let temp = tempdir().unwrap();
    let paths = SandboxPaths::new(temp.path());
    let store = SandboxFiles::new(paths.clone());
    let id = ProjectId::new("escape-check").unwrap();

    for hostile in ["../../etc/passwd", "../meta.json", "a/../../../x", "/../up.txt"] {
        let result = store.write_files(&id, &[SandboxFile::new(hostile, "pwned")]);
        assert!(
            matches!(result, Err(SandboxError::PathEscape(_))),
            "{} should be rejected",
            hostile
        );
    }

    assert!(!paths.meta_path(&id).exists());
    assert!(store.list_files(&id).unwrap().is_empty());
}

/// Projects are isolated from one another.
#[test]
fn test_projects_are_isolated() {
    let temp = tempdir().unwrap();
    let store = SandboxFiles::new(SandboxPaths::new(temp.path()));
    let a = ProjectId::new("a").unwrap();
    let b = ProjectId::new("b").unwrap();

    store
        .write_files(&a, &[SandboxFile::new("only-in-a.txt", "a")])
        .unwrap();

    assert_eq!(store.list_files(&a).unwrap(), vec!["only-in-a.txt"]);
    assert!(store.list_files(&b).unwrap().is_empty());
    assert_eq!(store.read_file(&b, "only-in-a.txt").unwrap(), None);
}

/// Overwrite replaces the full content instead of patching it.
#[test]
fn test_overwrite_replaces_content() {
    let temp = tempdir().unwrap();
    let store = SandboxFiles::new(SandboxPaths::new(temp.path()));
    let id = ProjectId::new("overwrite").unwrap();

    store
        .write_files(&id, &[SandboxFile::new("app.js", "a very long original body")])
        .unwrap();
    let report = store
        .write_files(&id, &[SandboxFile::new("app.js", "short")])
        .unwrap();

    assert_eq!(report.written, vec!["app.js"]);
    let on_disk = fs::read_to_string(store.paths().current_dir(&id).join("app.js")).unwrap();
    assert_eq!(on_disk, "short");
}

/// A snapshot follows the listing and keeps the listing order.
#[test]
fn test_snapshot_of_listing() {
    let temp = tempdir().unwrap();
    let store = SandboxFiles::new(SandboxPaths::new(temp.path()));
    let id = ProjectId::new("snap").unwrap();

    store
        .write_files(
            &id,
            &[
                SandboxFile::new("b.txt", "bbb"),
                SandboxFile::new("a.txt", "aaa"),
            ],
        )
        .unwrap();

    let listing = store.list_files(&id).unwrap();
    let snapshot = store.read_snapshot(&id, &listing, 120_000).unwrap();

    let paths: Vec<_> = snapshot.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);
    assert_eq!(snapshot[0].content, "aaa");
}
