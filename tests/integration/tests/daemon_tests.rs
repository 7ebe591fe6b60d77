//! The supervisor mirroring several subtrees from one store

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use mirror_cli::{Config, Supervisor, config::parse_mirror};
use mirror_core::StoreError;
use mirror_test_utils::{FakeStore, read_dir_tree, within};
use tempfile::TempDir;

async fn wait_for(dir: &Path, pairs: &[(&str, &str)]) {
    let expected: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    within(async {
        while read_dir_tree(dir) != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_tenants_converge_after_outage() {
    let store = FakeStore::shared();
    store.put("/tenants/acme/motd", "hi acme");
    store.put("/tenants/globex/motd", "hi globex");
    let acme = TempDir::new().unwrap();
    let globex = TempDir::new().unwrap();

    let mut config = Config::default();
    config.restart.initial_interval_ms = 5;
    config.restart.max_interval_ms = 20;
    for (subtree, dir) in [("/tenants/acme", &acme), ("/tenants/globex", &globex)] {
        let mut mirror = parse_mirror(&format!("{}={}", subtree, dir.path().display())).unwrap();
        mirror.fsync = false;
        config.mirrors.push(mirror);
    }
    config.validate().unwrap();

    let supervisor = Supervisor::new(store.clone(), &config).unwrap();
    let stop = supervisor.stop_token();
    let running = tokio::spawn(supervisor.run());

    wait_for(acme.path(), &[("/motd", "hi acme")]).await;
    wait_for(globex.path(), &[("/motd", "hi globex")]).await;

    // One engine loses its watch; the store changes before it comes back
    within(store.wait_for_watches(2)).await;
    store.fail_next_watch(StoreError::transport("etcd restarted"));
    store.put("/tenants/acme/extra", "1");
    store.put("/tenants/globex/motd", "bye");

    wait_for(acme.path(), &[("/motd", "hi acme"), ("/extra", "1")]).await;
    wait_for(globex.path(), &[("/motd", "bye")]).await;

    stop.cancel();
    within(running).await.unwrap().unwrap();
}
