use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::debug;

use super::hub::HubInner;
use crate::constants::CLOSE_EVENT;
use crate::EventEmitter;
use crate::ListenerId;
use crate::Result;

/// Identifies a watcher inside its hub's live set
pub type WatcherId = u64;

type Cleanup = Box<dyn FnOnce() + Send>;

pub(super) struct WatcherInner {
    pub(super) id: WatcherId,
    pub(super) path: String,
    /// Watcher-local emitter; the feed re-emits matching events here
    pub(super) emitter: EventEmitter,
    refs: AtomicI64,
    closed: AtomicBool,
    cleanup: Mutex<Option<Cleanup>>,
    /// Registrations held on the shared feed, released on close
    feed_listeners: Mutex<Vec<(String, ListenerId)>>,
    hub: Weak<HubInner>,
    close_linger: Duration,
}

/// Path-scoped handle returned by [`WatchHub::watch`](crate::WatchHub::watch)
/// and [`WatchHub::watch_file`](crate::WatchHub::watch_file).
///
/// Clones share one watcher. A watcher stays live until [`close`](Self::close)
/// is called, its reference count drops to zero through [`unref`](Self::unref),
/// or the hub unwatches its path.
#[derive(Clone)]
pub struct Watcher {
    pub(super) inner: Arc<WatcherInner>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("refs", &self.ref_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Watcher {
    pub(super) fn new(
        id: WatcherId,
        path: &str,
        emitter: EventEmitter,
        hub: Weak<HubInner>,
        close_linger: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                id,
                path: path.to_string(),
                emitter,
                refs: AtomicI64::new(0),
                closed: AtomicBool::new(false),
                cleanup: Mutex::new(None),
                feed_listeners: Mutex::new(Vec::new()),
                hub,
                close_linger,
            }),
        }
    }

    pub(super) fn downgrade(&self) -> Weak<WatcherInner> {
        Arc::downgrade(&self.inner)
    }

    pub(super) fn track_feed_listener(
        &self,
        event: &str,
        id: ListenerId,
    ) {
        self.inner.feed_listeners.lock().push((event.to_string(), id));
    }

    /// Registers a listener on the watcher-local emitter
    pub(super) fn on_local<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.inner.emitter.on(event, listener)
    }

    pub fn id(&self) -> WatcherId {
        self.inner.id
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn ref_count(&self) -> i64 {
        self.inner.refs.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn add_ref(&self) -> &Self {
        self.inner.refs.fetch_add(1, Ordering::AcqRel);
        self
    }

    /// Drops one reference; the watcher closes once the count is zero or below.
    pub fn unref(&self) -> &Self {
        if self.inner.refs.fetch_sub(1, Ordering::AcqRel) - 1 <= 0 {
            self.close();
        }
        self
    }

    /// Runs `cleanup` once, when the watcher closes. Replaces any earlier callback.
    pub fn set_cleanup<F>(
        &self,
        cleanup: F,
    ) where
        F: FnOnce() + Send + 'static,
    {
        *self.inner.cleanup.lock() = Some(Box::new(cleanup));
    }

    /// Registers `listener` for the terminal `"close"` event.
    pub fn on_close<F>(
        &self,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.emitter.once(CLOSE_EVENT, move |_| listener())
    }

    /// Closes the watcher. Calling it again is a no-op.
    ///
    /// Leaves the hub's live set, detaches from the shared feed, runs the
    /// cleanup callback and emits `"close"`. Every other listener is released
    /// right away; `"close"` listeners are released after the configured
    /// linger so they still observe the terminal event.
    pub fn close(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let feed_listeners: Vec<(String, ListenerId)> =
            inner.feed_listeners.lock().drain(..).collect();
        if let Some(hub) = inner.hub.upgrade() {
            hub.forget(inner.id);
            if let Some(feed) = hub.existing_feed() {
                for (event, id) in feed_listeners {
                    feed.remove_listener(&event, id);
                }
            }
        }
        inner.refs.store(0, Ordering::Release);

        let cleanup = inner.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }

        inner.emitter.emit(CLOSE_EVENT, Vec::new());
        for event in inner.emitter.event_names() {
            if event != CLOSE_EVENT {
                inner.emitter.remove_all_listeners(Some(&event));
            }
        }

        let emitter = inner.emitter.clone();
        match Handle::try_current() {
            Ok(runtime) => {
                let linger = inner.close_linger;
                runtime.spawn(async move {
                    tokio::time::sleep(linger).await;
                    emitter.dispose();
                });
            }
            Err(_) => emitter.dispose(),
        }
        debug!(watcher = inner.id, path = %inner.path, "watcher closed");
    }
}
