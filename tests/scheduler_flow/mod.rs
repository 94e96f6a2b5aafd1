use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use sab_bus::BackoffPolicy;
use sab_bus::Engine;
use sab_bus::LockAwareScheduler;
use serde_json::json;
use tokio::time::Instant;

use crate::common::emitter;
use crate::common::region;
use crate::common::settle;
use crate::common::Calls;

#[derive(Debug, PartialEq)]
struct Busy;

#[tokio::test(start_paused = true)]
async fn write_waits_out_an_engine_mutation() {
    let (region, engine) = region();
    let scheduler = LockAwareScheduler::new(engine.clone(), BackoffPolicy::default());
    let bus = emitter(&engine, "fs");
    let calls = Calls::default();
    bus.on("written", calls.listener()).unwrap();

    region.set_locked(true);
    let engine_side = region.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        engine_side.set_locked(false);
    });

    let start = Instant::now();
    let result = scheduler
        .run(|| {
            let held = region.lock_is_held();
            let bus = bus.clone();
            async move {
                if held {
                    return Err(Busy);
                }
                bus.emit("written", vec![json!("/file")]);
                Ok(())
            }
        })
        .await;
    settle().await;

    assert_eq!(result, Ok(()));
    // lock polls sleep 100 + 200, the flag clears at 250
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(calls.take(), vec![vec![json!("/file")]]);
}

#[tokio::test(start_paused = true)]
async fn wrapped_operation_surfaces_its_last_error() {
    let (_region, engine) = region();
    let policy = BackoffPolicy {
        num_of_attempts: 3,
        ..BackoffPolicy::default()
    };
    let scheduler = LockAwareScheduler::new(engine, policy);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let mkdir = scheduler.wrap(move |path: String| {
        counter.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>(format!("EEXIST: {path}"))
    });

    let err = mkdir("/tmp".to_string()).await.unwrap_err();

    assert_eq!(err, "EEXIST: /tmp");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}
