use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use super::StatSnapshot;
use super::WatchEventKind;
use super::WatchOptions;
use super::Watcher;
use super::WatcherId;
use crate::constants::CHANGE_EVENT;
use crate::constants::UNWATCH_ALL;
use crate::constants::WATCH_EVENT;
use crate::BusConfig;
use crate::Engine;
use crate::EventEmitter;
use crate::Result;
use crate::Settings;
use crate::WatchConfig;

lazy_static! {
    static ref GLOBAL_HUB: Mutex<Option<WatchHub>> = Mutex::new(None);
}

pub(crate) struct HubInner {
    engine: Arc<dyn Engine>,
    bus: BusConfig,
    watch: WatchConfig,
    /// Shared `"change"`/`"rename"`/`"watch_"` feed, created on first watch
    feed: OnceCell<EventEmitter>,
    live: DashMap<WatcherId, Watcher>,
    next_watcher_id: AtomicU64,
}

impl HubInner {
    pub(super) fn forget(
        &self,
        id: WatcherId,
    ) {
        self.live.remove(&id);
    }

    pub(super) fn existing_feed(&self) -> Option<&EventEmitter> {
        self.feed.get()
    }
}

/// Owns the shared engine feed and the set of live watchers.
///
/// Every watcher subscribes to one feed emitter, named by
/// [`WatchConfig::feed_name`], and re-emits only the events that match its
/// path. The feed is attached lazily so a hub can be built before the region
/// is mapped.
#[derive(Clone)]
pub struct WatchHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for WatchHub {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchHub")
            .field("feed", &self.inner.watch.feed_name)
            .field("live", &self.inner.live.len())
            .finish()
    }
}

impl WatchHub {
    pub fn new(
        engine: Arc<dyn Engine>,
        settings: &Settings,
    ) -> Self {
        Self {
            inner: Arc::new(HubInner {
                engine,
                bus: settings.bus.clone(),
                watch: settings.watch.clone(),
                feed: OnceCell::new(),
                live: DashMap::new(),
                next_watcher_id: AtomicU64::new(1),
            }),
        }
    }

    /// Makes `self` the process-wide hub unless one is installed already.
    /// Returns the hub that ends up installed.
    pub fn install(self) -> WatchHub {
        let mut global = GLOBAL_HUB.lock();
        global.get_or_insert(self).clone()
    }

    pub fn global() -> Option<WatchHub> {
        GLOBAL_HUB.lock().clone()
    }

    /// Removes the process-wide hub and shuts it down.
    pub fn teardown_global() {
        let hub = GLOBAL_HUB.lock().take();
        if let Some(hub) = hub {
            hub.shutdown();
        }
    }

    /// The shared feed emitter, attached on first use
    pub fn feed(&self) -> Result<&EventEmitter> {
        self.inner.feed.get_or_try_init(|| {
            let feed = EventEmitter::new(
                self.inner.engine.clone(),
                Some(&self.inner.watch.feed_name),
                &self.inner.bus,
            )?;
            info!(feed = %self.inner.watch.feed_name, "shared feed attached");
            Ok(feed)
        })
    }

    fn create_watcher(
        &self,
        path: &str,
    ) -> Result<Watcher> {
        let emitter = EventEmitter::new(self.inner.engine.clone(), None, &self.inner.bus)?;
        let id = self.inner.next_watcher_id.fetch_add(1, Ordering::Relaxed);
        let watcher = Watcher::new(
            id,
            path,
            emitter,
            Arc::downgrade(&self.inner),
            self.inner.watch.close_linger(),
        );
        self.inner.live.insert(id, watcher.clone());
        Ok(watcher)
    }

    /// Runs `attach` against a fresh watcher; a failed attach closes it again.
    fn build_watcher<F>(
        &self,
        path: &str,
        attach: F,
    ) -> Result<Watcher>
    where
        F: FnOnce(&Watcher, &EventEmitter) -> Result<()>,
    {
        let feed = self.feed()?;
        let watcher = self.create_watcher(path)?;
        if let Err(e) = attach(&watcher, feed) {
            watcher.close();
            return Err(e);
        }
        debug!(watcher = watcher.id(), path, "watcher attached");
        Ok(watcher)
    }

    /// Watches `path` for `"change"` and `"rename"` feed events.
    ///
    /// With `recursive`, any affected path starting with `path` matches;
    /// otherwise only `path` itself does.
    pub fn watch<F>(
        &self,
        path: &str,
        options: WatchOptions,
        callback: F,
    ) -> Result<Watcher>
    where
        F: Fn(WatchEventKind, &str) + Send + Sync + 'static,
    {
        self.build_watcher(path, |watcher, feed| {
            watcher.on_local(CHANGE_EVENT, move |args| {
                let kind = args
                    .first()
                    .and_then(Value::as_str)
                    .and_then(WatchEventKind::parse);
                let file = args.get(1).and_then(Value::as_str);
                if let (Some(kind), Some(file)) = (kind, file) {
                    callback(kind, file);
                }
            })?;

            for kind in [WatchEventKind::Change, WatchEventKind::Rename] {
                let target = watcher.downgrade();
                let watched = path.to_string();
                let recursive = options.recursive;
                let id = feed.on(kind.as_str(), move |args| {
                    let Some(file) = args.first().and_then(Value::as_str) else {
                        return;
                    };
                    if !path_matches(&watched, file, recursive) {
                        return;
                    }
                    if let Some(watcher) = target.upgrade() {
                        watcher
                            .emitter
                            .emit(CHANGE_EVENT, vec![json!(kind.as_str()), json!(file)]);
                    }
                })?;
                watcher.track_feed_listener(kind.as_str(), id);
            }
            Ok(())
        })
    }

    /// Watches the stat snapshots the engine reports for `path`.
    ///
    /// `callback` receives `(curr, prev)`; missing snapshots and fields are
    /// zero-filled.
    pub fn watch_file<F>(
        &self,
        path: &str,
        callback: F,
    ) -> Result<Watcher>
    where
        F: Fn(&StatSnapshot, &StatSnapshot) + Send + Sync + 'static,
    {
        self.build_watcher(path, |watcher, feed| {
            watcher.on_local(CHANGE_EVENT, move |args| {
                let curr = StatSnapshot::fill(args.first());
                let prev = StatSnapshot::fill(args.get(1));
                callback(&curr, &prev);
            })?;

            let target = watcher.downgrade();
            let watched = path.to_string();
            // engine payload: [path, prev, curr]
            let id = feed.on(WATCH_EVENT, move |args| {
                if args.first().and_then(Value::as_str) != Some(watched.as_str()) {
                    return;
                }
                let prev = StatSnapshot::fill(args.get(1));
                let curr = StatSnapshot::fill(args.get(2));
                if let Some(watcher) = target.upgrade() {
                    watcher
                        .emitter
                        .emit(CHANGE_EVENT, vec![curr.to_value(), prev.to_value()]);
                }
            })?;
            watcher.track_feed_listener(WATCH_EVENT, id);
            Ok(())
        })
    }

    /// Closes every live watcher on `path`, or all of them for `"*"`.
    /// Returns how many watchers were closed.
    pub fn unwatch_file(
        &self,
        path: &str,
    ) -> usize {
        let closing: Vec<Watcher> = if path == UNWATCH_ALL {
            if let Some(feed) = self.inner.feed.get() {
                feed.remove_all_listeners(None);
            }
            let all = self.inner.live.iter().map(|e| e.value().clone()).collect();
            self.inner.live.clear();
            all
        } else {
            self.inner
                .live
                .iter()
                .filter(|e| e.value().path() == path)
                .map(|e| e.value().clone())
                .collect()
        };

        let count = closing.len();
        for watcher in closing {
            watcher.close();
        }
        debug!(path, closed = count, "unwatched");
        count
    }

    pub fn live_count(&self) -> usize {
        self.inner.live.len()
    }

    /// Closes every watcher and disposes the shared feed.
    pub fn shutdown(&self) {
        let closed = self.unwatch_file(UNWATCH_ALL);
        if let Some(feed) = self.inner.feed.get() {
            feed.dispose();
        }
        info!(closed, "watch hub shut down");
    }
}

fn path_matches(
    watched: &str,
    affected: &str,
    recursive: bool,
) -> bool {
    if recursive {
        affected.starts_with(watched)
    } else {
        affected == watched
    }
}
