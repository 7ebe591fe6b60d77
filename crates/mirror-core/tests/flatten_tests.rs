//! Property tests: a flattened snapshot written to a sink reproduces the
//! leaves of the subtree exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use mirror_core::{MirrorEngine, MirrorEvent, RemoteNode, StoreClient, flatten, max_version};
use mirror_fs::{KeyPath, MemorySink, Sink};
use mirror_test_utils::{FakeStore, within};
use proptest::prelude::*;

type Leaves = BTreeMap<Vec<String>, String>;

fn leaves_strategy() -> impl Strategy<Value = Leaves> {
    let segment = "[a-d]{1,2}";
    let key = prop::collection::vec(segment, 1..4);
    prop::collection::btree_map(key, "[a-z0-9 ]{0,12}", 0..16).prop_map(|mut leaves| {
        // A leaf can never also be a directory
        let keys: Vec<Vec<String>> = leaves.keys().cloned().collect();
        leaves.retain(|k, _| {
            !keys
                .iter()
                .any(|other| other.len() > k.len() && other.starts_with(k))
        });
        leaves
    })
}

fn key_of(segments: &[String]) -> String {
    format!("/{}", segments.join("/"))
}

fn build(key: &[String], leaves: &Leaves, version: &mut u64) -> RemoteNode {
    if let Some(value) = leaves.get(key) {
        *version += 1;
        return RemoteNode::leaf(key_of(key), value.clone(), *version);
    }
    let names: BTreeSet<&String> = leaves
        .keys()
        .filter(|k| k.len() > key.len() && k.starts_with(key))
        .map(|k| &k[key.len()])
        .collect();
    let children = names
        .into_iter()
        .map(|name| {
            let mut child = key.to_vec();
            child.push(name.clone());
            build(&child, leaves, version)
        })
        .collect();
    RemoteNode::directory(key_of(key), children)
}

fn expected(leaves: &Leaves, root: &[String]) -> BTreeMap<String, String> {
    leaves
        .iter()
        .filter(|(k, _)| k.len() > root.len() && k.starts_with(root))
        .map(|(k, v)| (key_of(&k[root.len()..]), v.clone()))
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn flatten_then_write_reproduces_leaves(leaves in leaves_strategy()) {
        let mut version = 0;
        let tree = build(&[], &leaves, &mut version);
        let entries = flatten(Some(&tree), &KeyPath::root());

        let sink = MemorySink::new();
        runtime().block_on(async {
            for entry in &entries {
                sink.set(entry.relative_path.as_str(), &entry.value).await.unwrap();
            }
        });

        prop_assert_eq!(entries.len(), leaves.len());
        prop_assert_eq!(sink.dump(), expected(&leaves, &[]));
    }

    #[test]
    fn scoped_flatten_only_keeps_the_subtree(leaves in leaves_strategy()) {
        let root = vec!["a".to_string()];
        let mut version = 0;
        let tree = build(&[], &leaves, &mut version);
        let entries = flatten(Some(&tree), &KeyPath::new("/a"));

        let flat: BTreeMap<String, String> = entries
            .into_iter()
            .map(|e| (e.relative_path.to_string(), String::from_utf8(e.value).unwrap()))
            .collect();

        prop_assert_eq!(flat, expected(&leaves, &root));
    }

    #[test]
    fn max_version_covers_every_node(leaves in leaves_strategy()) {
        let mut version = 0;
        let tree = build(&[], &leaves, &mut version);
        prop_assert_eq!(max_version(&tree), version);
    }
}

#[tokio::test]
async fn test_engine_mirror_matches_store_snapshot() {
    let store = FakeStore::shared();
    store.put("/stiitops/motd", "hello");
    store.put("/stiitops/hosts/web1/ip", "10.0.0.1");
    store.put("/stiitops/hosts/web2/ip", "10.0.0.2");
    store.put("/stiitops/empty", "");
    store.put("/unrelated", "nope");
    let sink = Arc::new(MemorySink::new());

    let snapshot = store.get("/stiitops", true).await.unwrap();
    let entries = flatten(Some(&snapshot), &KeyPath::new("/stiitops"));

    let mut handle = MirrorEngine::new(store.clone(), "/stiitops", sink.clone())
        .unwrap()
        .start();
    assert!(matches!(
        within(handle.next_event()).await,
        Some(MirrorEvent::Synced)
    ));

    let from_flatten: BTreeMap<String, Vec<u8>> = entries
        .into_iter()
        .map(|e| (e.relative_path.to_string(), e.value))
        .collect();
    assert_eq!(sink.snapshot(), from_flatten);
    assert_eq!(sink.get("/empty"), Some(Vec::new()));

    handle.stop();
    within(handle.join()).await;
}
