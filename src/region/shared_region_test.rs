use serde_json::json;

use super::*;
use crate::Error;

#[test]
fn allocate_should_fail_fast_when_region_is_unmapped() {
    let region = SharedRegion::unmapped();

    assert!(matches!(region.allocate_channel(), Err(Error::NotInitialized)));

    region.map();
    assert_eq!(region.allocate_channel().unwrap(), 0);
}

#[test]
fn freed_slots_are_recycled_first() {
    let region = SharedRegion::new();
    let a = region.allocate_channel().unwrap();
    let b = region.allocate_channel().unwrap();
    let c = region.allocate_channel().unwrap();
    assert_eq!((a, b, c), (0, 1, 2));

    region.free_channel(b);
    assert_eq!(region.held_channel_count(), 2);
    assert_eq!(region.allocate_channel().unwrap(), b);
    assert_eq!(region.allocate_channel().unwrap(), 3);
}

#[test]
fn channel_is_fifo_and_free_discards_pending_payloads() {
    let region = SharedRegion::new();
    let id = region.allocate_channel().unwrap();

    region.send(id, "e1".into());
    region.send(id, "e2".into());
    region.send(id, "e3".into());

    assert_eq!(region.receive_channel(id).as_deref(), Some("e1"));
    assert_eq!(region.receive_channel(id).as_deref(), Some("e2"));
    assert_eq!(region.pending_payloads(id), 1);

    region.free_channel(id);
    assert_eq!(region.receive_channel(id), None);

    let again = region.allocate_channel().unwrap();
    assert_eq!(again, id);
    assert_eq!(region.receive_channel(again), None, "recycled slot must start empty");
}

#[test]
fn multicast_reaches_every_subscriber_and_drops_once_subscriptions() {
    let region = SharedRegion::new();
    let persistent = region.allocate_channel().unwrap();
    let single = region.allocate_channel().unwrap();
    region
        .subscribe("fs", "change", persistent, SubscribeMode::Append, false)
        .unwrap();
    region.subscribe("fs", "change", single, SubscribeMode::Append, true).unwrap();

    region.raise("fs", "change", vec![json!("/a")]).unwrap();
    region.raise("fs", "change", vec![json!("/b")]).unwrap();

    assert_eq!(region.pending_payloads(persistent), 2);
    assert_eq!(region.pending_payloads(single), 1);
    assert_eq!(region.subscribed_channels("fs", "change"), vec![persistent]);
    assert_eq!(region.receive_channel(single).as_deref(), Some(r#"["/a"]"#));
}

#[test]
fn prepend_places_subscription_first() {
    let region = SharedRegion::new();
    let first = region.allocate_channel().unwrap();
    let second = region.allocate_channel().unwrap();
    region.subscribe("e", "x", first, SubscribeMode::Append, false).unwrap();
    region.subscribe("e", "x", second, SubscribeMode::Prepend, false).unwrap();

    assert_eq!(region.subscribed_channels("e", "x"), vec![second, first]);
}

#[test]
fn subscribe_should_respect_listener_limit() {
    let region = SharedRegion::new();
    region.set_max_listeners("e", 1);
    assert_eq!(region.get_max_listeners("e"), 1);

    region.subscribe("e", "x", 0, SubscribeMode::Append, false).unwrap();
    let err = region.subscribe("e", "x", 1, SubscribeMode::Append, false).unwrap_err();
    assert!(matches!(err, Error::TooManyListeners { limit: 1, .. }));

    // other events are counted separately
    region.subscribe("e", "y", 1, SubscribeMode::Append, false).unwrap();
}

#[test]
fn multicast_on_unmapped_region_is_rejected() {
    let region = SharedRegion::new();
    region.unmap();
    assert!(matches!(
        region.multicast("fs", "change", "[]".into()),
        Err(Error::NotInitialized)
    ));
}

#[test]
fn broadcast_skips_sender_and_send_all_reaches_everyone() {
    let region = SharedRegion::new();
    let a = region.allocate_channel().unwrap();
    let b = region.allocate_channel().unwrap();
    let c = region.allocate_channel().unwrap();
    region.free_channel(c);

    region.broadcast(a, "hello".into());
    assert_eq!(region.pending_payloads(a), 0);
    assert_eq!(region.pending_payloads(b), 1);

    region.send_all("all".into());
    assert_eq!(region.pending_payloads(a), 1);
    assert_eq!(region.pending_payloads(b), 2);
    assert_eq!(region.pending_payloads(c), 0);
}

#[test]
fn lock_guard_clears_flag_on_drop() {
    let region = SharedRegion::new();
    assert!(!region.lock_is_held());
    {
        let _guard = region.lock_guard();
        assert!(region.lock_is_held());
    }
    assert!(!region.lock_is_held());
}

#[test]
fn release_emitter_keeps_tables_with_live_subscriptions() {
    let region = SharedRegion::new();
    region.subscribe("busy", "x", 0, SubscribeMode::Append, false).unwrap();
    region.set_max_listeners("busy", 3);
    region.set_max_listeners("idle", 3);

    region.release_emitter("busy");
    region.release_emitter("idle");

    assert_eq!(region.get_max_listeners("busy"), 3);
    assert_eq!(region.get_max_listeners("idle"), 0);
}

#[test]
fn reboot_resets_channels_and_tables() {
    let region = SharedRegion::new();
    region.allocate_channel().unwrap();
    region.subscribe("e", "x", 0, SubscribeMode::Append, false).unwrap();
    region.set_locked(true);

    region.diagnostics();
    region.reboot();

    assert_eq!(region.held_channel_count(), 0);
    assert!(region.subscribed_channels("e", "x").is_empty());
    assert!(!region.lock_is_held());
}
