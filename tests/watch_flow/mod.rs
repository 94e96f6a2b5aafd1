use std::sync::Arc;

use parking_lot::Mutex;
use sab_bus::Settings;
use sab_bus::WatchEventKind;
use sab_bus::WatchHub;
use sab_bus::WatchOptions;
use serde_json::json;
use serde_json::Value;

use crate::common::region;
use crate::common::settle;

#[tokio::test(start_paused = true)]
async fn watchers_see_only_their_subtree_until_closed() {
    let (region, engine) = region();
    let hub = WatchHub::new(engine, &Settings::default());
    let events: Arc<Mutex<Vec<(WatchEventKind, String)>>> = Arc::default();

    let sink = events.clone();
    let tree = hub
        .watch("/home", WatchOptions { recursive: true }, move |kind, path| {
            sink.lock().push((kind, path.to_string()))
        })
        .unwrap();
    tree.add_ref();

    region.raise("fs", "change", vec![json!("/home/u/notes.txt")]).unwrap();
    region.raise("fs", "rename", vec![json!("/home/u/old")]).unwrap();
    region.raise("fs", "change", vec![json!("/etc/hosts")]).unwrap();
    settle().await;

    let mut seen = std::mem::take(&mut *events.lock());
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (WatchEventKind::Change, "/home/u/notes.txt".to_string()),
            (WatchEventKind::Rename, "/home/u/old".to_string()),
        ]
    );

    tree.unref();
    assert!(tree.is_closed());
    region.raise("fs", "change", vec![json!("/home/u/notes.txt")]).unwrap();
    settle().await;
    assert!(events.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn stat_watchers_receive_current_and_previous_snapshots() {
    let (region, engine) = region();
    let hub = WatchHub::new(engine, &Settings::default());
    let sizes: Arc<Mutex<Vec<(u64, u64)>>> = Arc::default();

    let sink = sizes.clone();
    hub.watch_file("/log", move |curr, prev| sink.lock().push((curr.size, prev.size)))
        .unwrap();

    region
        .raise("fs", "watch_", vec![json!("/log"), Value::Null, json!({"size": 3})])
        .unwrap();
    settle().await;
    region
        .raise("fs", "watch_", vec![json!("/log"), json!({"size": 3}), json!({"size": 8})])
        .unwrap();
    settle().await;

    assert_eq!(*sizes.lock(), vec![(3, 0), (8, 3)]);

    hub.shutdown();
    assert_eq!(hub.live_count(), 0);
}
