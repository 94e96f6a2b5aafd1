use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use sab_bus::BusConfig;
use sab_bus::Engine;
use sab_bus::EventEmitter;
use sab_bus::SharedRegion;
use serde_json::Value;

/// Long enough for a payload to cross the feed and one watcher hop
pub const SETTLE_IN_MS: u64 = 50;

pub fn region() -> (Arc<SharedRegion>, Arc<dyn Engine>) {
    let region = Arc::new(SharedRegion::new());
    let engine: Arc<dyn Engine> = region.clone();
    (region, engine)
}

pub fn emitter(
    engine: &Arc<dyn Engine>,
    name: &str,
) -> EventEmitter {
    EventEmitter::new(engine.clone(), Some(name), &BusConfig::default()).expect("region is mapped")
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(SETTLE_IN_MS)).await;
}

#[derive(Clone, Default)]
pub struct Calls {
    inner: Arc<Mutex<Vec<Vec<Value>>>>,
}

impl Calls {
    pub fn listener(&self) -> impl Fn(&[Value]) + Send + Sync + 'static {
        let inner = self.inner.clone();
        move |args: &[Value]| inner.lock().push(args.to_vec())
    }

    pub fn take(&self) -> Vec<Vec<Value>> {
        std::mem::take(&mut *self.inner.lock())
    }
}
