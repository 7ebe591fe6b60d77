//! End-to-end mirror scenarios over both sink implementations

use std::collections::BTreeMap;
use std::sync::Arc;

use mirror_core::{MirrorEngine, MirrorEvent, MirrorHandle, MirrorPhase};
use mirror_fs::{DirectorySink, MemorySink, Sink, WriteOptions};
use mirror_test_utils::{FakeStore, read_dir_tree, within};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Memory,
    Directory,
}

/// A sink plus a way to read back what it holds.
enum Target {
    Memory(Arc<MemorySink>),
    Directory(TempDir, Arc<DirectorySink>),
}

impl Target {
    fn new(kind: Kind) -> Self {
        match kind {
            Kind::Memory => Target::Memory(Arc::new(MemorySink::new())),
            Kind::Directory => {
                let dir = TempDir::new().unwrap();
                let sink = DirectorySink::with_options(dir.path(), WriteOptions { fsync: false })
                    .unwrap();
                Target::Directory(dir, Arc::new(sink))
            }
        }
    }

    fn sink(&self) -> Arc<dyn Sink> {
        match self {
            Target::Memory(sink) => sink.clone() as Arc<dyn Sink>,
            Target::Directory(_, sink) => sink.clone() as Arc<dyn Sink>,
        }
    }

    fn contents(&self) -> BTreeMap<String, String> {
        match self {
            Target::Memory(sink) => sink.dump(),
            Target::Directory(dir, _) => read_dir_tree(dir.path()),
        }
    }
}

fn contents(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn start(store: Arc<FakeStore>, root: &str, target: &Target) -> MirrorHandle {
    MirrorEngine::new(store, root, target.sink())
        .unwrap()
        .start()
}

async fn expect_event(handle: &mut MirrorHandle) -> MirrorEvent {
    within(handle.next_event())
        .await
        .expect("engine finished early")
}

async fn finish(handle: MirrorHandle) {
    handle.stop();
    assert_eq!(within(handle.join()).await, MirrorPhase::Stopped);
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn scenario_a_whole_store(#[case] kind: Kind) {
    let store = FakeStore::shared();
    store.put("/foo/txt", "1234");
    store.put("/foo/bar/baz", "abc");
    let target = Target::new(kind);

    let mut handle = start(store, "/", &target);
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Synced));

    assert_eq!(
        target.contents(),
        contents(&[("/foo/txt", "1234"), ("/foo/bar/baz", "abc")])
    );
    finish(handle).await;
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn scenario_b_nested_root_excludes_siblings(#[case] kind: Kind) {
    let store = FakeStore::shared();
    store.put("/bar/txt", "1234");
    store.put("/bar/bar/baz/quux", "abc");
    let target = Target::new(kind);

    let mut handle = start(store, "/bar/bar", &target);
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Synced));

    assert_eq!(target.contents(), contents(&[("/baz/quux", "abc")]));
    finish(handle).await;
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn scenario_c_missing_root_is_empty(#[case] kind: Kind) {
    let store = FakeStore::shared();
    store.put("/present", "x");
    let target = Target::new(kind);

    let mut handle = start(store, "/absent/root", &target);
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Synced));

    assert_eq!(target.contents(), BTreeMap::new());
    assert!(handle.try_next_event().is_none());
    finish(handle).await;
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn scenario_d_changes_and_sibling_noise(#[case] kind: Kind) {
    // The store reports every change, not only those under the watched root
    let store = FakeStore::unfiltered();
    let target = Target::new(kind);

    let mut handle = start(store.clone(), "/watched", &target);
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Synced));
    assert_eq!(target.contents(), BTreeMap::new());
    within(store.wait_for_watches(1)).await;

    store.put("/watched/key", "val");
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Changed { .. }));
    assert_eq!(target.contents(), contents(&[("/key", "val")]));

    within(store.wait_for_watches(2)).await;
    store.put("/sibling/key", "noise");
    // The sibling batch was consumed once the next watch is armed
    within(store.wait_for_watches(3)).await;
    assert!(handle.try_next_event().is_none());

    store.put("/watched/key", "val2");
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Changed { .. }));
    assert_eq!(target.contents(), contents(&[("/key", "val2")]));
    assert!(handle.try_next_event().is_none());

    finish(handle).await;
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn deletions_follow_the_store(#[case] kind: Kind) {
    let store = FakeStore::shared();
    store.put("/svc/web/port", "80");
    store.put("/svc/web/host", "a");
    store.put("/svc/db/port", "5432");
    let target = Target::new(kind);

    let mut handle = start(store.clone(), "/svc", &target);
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Synced));

    store.delete("/svc/web/host");
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Changed { .. }));
    assert_eq!(
        target.contents(),
        contents(&[("/web/port", "80"), ("/db/port", "5432")])
    );

    store.delete("/svc/db");
    assert!(matches!(expect_event(&mut handle).await, MirrorEvent::Changed { .. }));
    assert_eq!(target.contents(), contents(&[("/web/port", "80")]));

    finish(handle).await;
}

#[rstest]
#[case(Kind::Memory)]
#[case(Kind::Directory)]
#[tokio::test]
async fn restart_resumes_from_a_fresh_read(#[case] kind: Kind) {
    let store = FakeStore::shared();
    store.put("/app/a", "1");
    let target = Target::new(kind);

    let mut first = start(store.clone(), "/app", &target);
    assert!(matches!(expect_event(&mut first).await, MirrorEvent::Synced));
    finish(first).await;

    // Changes made while nothing was watching
    store.put("/app/a", "2");
    store.put("/app/b", "3");

    let mut second = start(store.clone(), "/app", &target);
    assert!(matches!(expect_event(&mut second).await, MirrorEvent::Synced));
    assert_eq!(target.contents(), contents(&[("/a", "2"), ("/b", "3")]));
    finish(second).await;
}
