//! Preview acquisition against a mock launcher.

use std::sync::Arc;
use std::time::Duration;

use devassist_preview::{
    MockLauncher, PreviewError, PreviewManager, PreviewStatus, Readiness, ReadinessConfig,
};
use devassist_sandbox::{ProjectId, SandboxPaths};
use devassist_store::{MetaPatch, MetaStore, PreviewState, ProjectLocks};
use tempfile::TempDir;

fn manager(launcher: &MockLauncher) -> (TempDir, PreviewManager, MetaStore) {
    let temp = tempfile::tempdir().unwrap();
    let paths = SandboxPaths::new(temp.path());
    let meta = MetaStore::new(paths.clone());
    let manager = PreviewManager::new(paths, meta.clone(), ProjectLocks::new(), Arc::new(launcher.clone()))
        .with_readiness(
            ReadinessConfig::default()
                .interval(Duration::from_millis(10))
                .timeout(Duration::from_millis(100)),
        );
    (temp, manager, meta)
}

#[tokio::test]
async fn test_first_acquire_starts_and_records() {
    let launcher = MockLauncher::new().listening();
    let (temp, manager, meta) = manager(&launcher);
    let id = ProjectId::new("shop").unwrap();

    let redirect = manager.acquire(&id).await.unwrap();
    assert_eq!(redirect.location, "/preview/shop/next");
    assert_eq!(redirect.cookie.header_value(), "project-router=shop; Path=/; SameSite=Lax");
    assert!(matches!(redirect.status, PreviewStatus::Started(Readiness::Ready { .. })));

    let launches = launcher.launches();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0].port, redirect.port);
    assert_eq!(launches[0].workdir, temp.path().join("projects/shop/current"));
    assert!(launches[0].workdir.is_dir());

    let preview = meta.read(&id).unwrap().unwrap().preview.unwrap();
    assert_eq!(preview.port, redirect.port);
    assert!(manager.registry().contains(&id));
}

#[tokio::test]
async fn test_recorded_port_is_reused_without_spawning() {
    let launcher = MockLauncher::new().listening();
    let (_temp, manager, _meta) = manager(&launcher);
    let id = ProjectId::new("again").unwrap();

    let first = manager.acquire(&id).await.unwrap();
    let second = manager.acquire(&id).await.unwrap();

    assert_eq!(second.port, first.port);
    assert_eq!(second.status, PreviewStatus::Reused);
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn test_dead_recorded_port_still_redirects() {
    let launcher = MockLauncher::new();
    let (_temp, manager, meta) = manager(&launcher);
    let id = ProjectId::new("stale").unwrap();
    meta.patch(&id, MetaPatch::new().preview(PreviewState::new(1))).unwrap();

    let redirect = manager.acquire(&id).await.unwrap();
    assert_eq!(redirect.port, 1);
    assert_eq!(redirect.status, PreviewStatus::Reused);
    assert!(launcher.launches().is_empty());
}

#[tokio::test]
async fn test_recorded_port_does_not_wait_for_running_turn() {
    let temp = tempfile::tempdir().unwrap();
    let paths = SandboxPaths::new(temp.path());
    let meta = MetaStore::new(paths.clone());
    let locks = ProjectLocks::new();
    let launcher = MockLauncher::new();
    let manager = PreviewManager::new(paths, meta.clone(), locks.clone(), Arc::new(launcher.clone()));
    let id = ProjectId::new("busy").unwrap();
    meta.patch(&id, MetaPatch::new().preview(PreviewState::new(41234))).unwrap();

    // A chat turn holds the project for the whole build
    let _turn = locks.lock(&id).await;

    let redirect = tokio::time::timeout(Duration::from_secs(1), manager.acquire(&id))
        .await
        .expect("reuse should not wait for the project lock")
        .unwrap();
    assert_eq!(redirect.port, 41234);
    assert_eq!(redirect.status, PreviewStatus::Reused);
    assert!(launcher.launches().is_empty());
}

#[tokio::test]
async fn test_readiness_timeout_is_not_an_error() {
    let launcher = MockLauncher::new();
    let (_temp, manager, meta) = manager(&launcher);
    let id = ProjectId::new("slow").unwrap();

    let redirect = manager.acquire(&id).await.unwrap();
    assert!(matches!(redirect.status, PreviewStatus::Started(Readiness::TimedOut { .. })));
    assert_eq!(redirect.location, "/preview/slow/next");
    assert!(meta.read(&id).unwrap().unwrap().preview.is_some());
}

#[tokio::test]
async fn test_spawn_failure_records_nothing() {
    let launcher = MockLauncher::new().failing("npm not installed");
    let (_temp, manager, meta) = manager(&launcher);
    let id = ProjectId::new("broken").unwrap();

    let err = manager.acquire(&id).await.unwrap_err();
    assert!(matches!(err, PreviewError::Spawn { .. }));
    assert!(meta.read(&id).unwrap().map_or(true, |m| m.preview.is_none()));
    assert!(manager.registry().is_empty());
}

#[tokio::test]
async fn test_simultaneous_first_requests_spawn_once() {
    let launcher = MockLauncher::new().listening();
    let (_temp, manager, _meta) = manager(&launcher);
    let id = ProjectId::new("burst").unwrap();

    let (a, b) = tokio::join!(manager.acquire(&id), manager.acquire(&id));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.port, b.port);
    assert_eq!(launcher.launches().len(), 1);
}

#[tokio::test]
async fn test_shutdown_terminates_all() {
    let launcher = MockLauncher::new().listening();
    let (_temp, manager, _meta) = manager(&launcher);

    for name in ["one", "two"] {
        manager.acquire(&ProjectId::new(name).unwrap()).await.unwrap();
    }

    assert_eq!(manager.shutdown(), 2);
    assert_eq!(launcher.terminated(), vec![true, true]);
    assert!(manager.registry().is_empty());
}
