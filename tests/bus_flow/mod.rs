use serde_json::json;
use tracing_test::traced_test;

use crate::common::emitter;
use crate::common::region;
use crate::common::settle;
use crate::common::Calls;

#[tokio::test(start_paused = true)]
#[traced_test]
async fn engine_events_reach_every_consumer_of_a_name() {
    let (region, engine) = region();
    let first = emitter(&engine, "fs");
    let second = emitter(&engine, "fs");
    let a = Calls::default();
    let b = Calls::default();
    first.on("change", a.listener()).unwrap();
    second.once("change", b.listener()).unwrap();

    region.raise("fs", "change", vec![json!("/x")]).unwrap();
    region.raise("fs", "change", vec![json!("/y")]).unwrap();
    settle().await;

    assert_eq!(a.take(), vec![vec![json!("/x")], vec![json!("/y")]]);
    assert_eq!(b.take(), vec![vec![json!("/x")]]);
    assert_eq!(second.listener_count("change"), 0);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_never_leaks_channels() {
    let (region, engine) = region();
    let bus = emitter(&engine, "lifecycle");

    for round in 0..3 {
        let id = bus.on("tick", |_| {}).unwrap();
        bus.once("tick", |_| {}).unwrap();
        bus.prepend_once_listener("tock", |_| {}).unwrap();
        bus.emit("tick", vec![json!(round)]);
        settle().await;
        bus.remove_listener("tick", id);
        assert_eq!(bus.allocated_channels(), 1, "only the pending tock listener remains");
        bus.remove_all_listeners(Some("tock"));
    }

    assert_eq!(region.held_channel_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn corrupt_engine_payload_is_delivered_raw() {
    let (region, engine) = region();
    let bus = emitter(&engine, "fs");
    let calls = Calls::default();
    bus.on("error", calls.listener()).unwrap();

    region.send_all("inode table exhausted".to_string());
    settle().await;

    assert_eq!(calls.take(), vec![vec![json!("inode table exhausted")]]);
}
