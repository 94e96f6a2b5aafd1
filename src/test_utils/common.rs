use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use crate::BusConfig;
use crate::Engine;
use crate::EventEmitter;
use crate::SharedRegion;

/// Region + engine handle pair, the engine side kept for raising events
pub(crate) fn mapped_region() -> (Arc<SharedRegion>, Arc<dyn Engine>) {
    let region = Arc::new(SharedRegion::new());
    let engine: Arc<dyn Engine> = region.clone();
    (region, engine)
}

pub(crate) fn named_emitter(
    engine: &Arc<dyn Engine>,
    name: &str,
) -> EventEmitter {
    EventEmitter::new(engine.clone(), Some(name), &BusConfig::default()).expect("region is mapped")
}

/// Records every argument list a listener receives
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    calls: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn listener(&self) -> impl Fn(&[Value]) + Send + Sync + 'static {
        let calls = self.calls.clone();
        move |args: &[Value]| calls.lock().push(args.to_vec())
    }

    pub(crate) fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.lock().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.lock().len()
    }
}

/// Lets pollers run for a few dozen ticks
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}

/// Polls `condition` every millisecond until it holds or `timeout` elapses
pub(crate) async fn wait_until<F>(
    condition: F,
    timeout: Duration,
) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    condition()
}
