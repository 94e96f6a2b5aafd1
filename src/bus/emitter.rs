use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;
use std::time::Duration;

use nanoid::nanoid;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::ChannelRegistry;
use super::Payload;
use crate::constants::ANONYMOUS_EMITTER_PREFIX;
use crate::metrics::PAYLOADS_DELIVERED;
use crate::BusConfig;
use crate::ChannelId;
use crate::Engine;
use crate::Error;
use crate::Result;
use crate::SubscribeMode;

/// Callback invoked with the decoded argument list of one payload
pub type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Opaque token identifying one registration, returned by `on`/`once`/`prepend_*`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

struct Registration {
    id: ListenerId,
    event: String,
    channel: ChannelId,
    cancel: CancellationToken,
}

struct PollTask {
    id: ListenerId,
    event: String,
    channel: ChannelId,
    once: bool,
    cancel: CancellationToken,
    listener: Listener,
}

impl PollTask {
    fn deliver(
        &self,
        payload: Payload,
    ) {
        trace!(
            listener = ?self.id,
            event = %self.event,
            channel = self.channel,
            "payload delivered"
        );
        PAYLOADS_DELIVERED.with_label_values(&[&self.event]).inc();
        let args = payload.into_args();
        (self.listener)(&args);
    }
}

struct EmitterInner {
    name: String,
    registry: ChannelRegistry,
    /// Active registrations in registration order
    registrations: Mutex<Vec<Registration>>,
    poll_interval: Duration,
    disposed: AtomicBool,
}

impl EmitterInner {
    fn engine(&self) -> &Arc<dyn Engine> {
        self.registry.engine()
    }

    /// Cancels the poller first so a payload read after this point is dropped.
    fn teardown(
        &self,
        registration: Registration,
    ) {
        registration.cancel.cancel();
        self.engine()
            .unsubscribe(&self.name, &registration.event, registration.channel);
        self.registry.free(registration.channel);
        debug!(
            emitter = %self.name,
            event = %registration.event,
            listener = ?registration.id,
            "listener removed"
        );
    }

    fn remove_where<P>(
        &self,
        predicate: P,
        first_only: bool,
    ) -> usize
    where
        P: Fn(&Registration) -> bool,
    {
        let removed: Vec<Registration> = {
            let mut registrations = self.registrations.lock();
            let mut removed = Vec::new();
            let mut i = 0;
            while i < registrations.len() {
                if predicate(&registrations[i]) {
                    removed.push(registrations.remove(i));
                    if first_only {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
            removed
        };
        let count = removed.len();
        for registration in removed {
            self.teardown(registration);
        }
        count
    }

    fn dispose(&self) {
        {
            // Same lock as `register`, so no registration lands after the flag
            let _registrations = self.registrations.lock();
            if self.disposed.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        let removed = self.remove_where(|_| true, false);
        self.engine().release_emitter(&self.name);
        debug!(emitter = %self.name, listeners = removed, "emitter disposed");
    }
}

impl Drop for EmitterInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

async fn poll_channel(
    emitter: Weak<EmitterInner>,
    task: PollTask,
    poll_interval: Duration,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = task.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(inner) = emitter.upgrade() else {
            break;
        };

        if task.once {
            // At most one payload is drained; the registration is gone before
            // the listener runs.
            let Some(payload) = inner.registry.receive(task.channel) else {
                continue;
            };
            if task.cancel.is_cancelled() {
                break;
            }
            let owned = inner.remove_where(|r| r.id == task.id, true) == 1;
            drop(inner);
            if owned {
                task.deliver(payload);
            }
            break;
        }

        while let Some(payload) = inner.registry.receive(task.channel) {
            if task.cancel.is_cancelled() {
                return;
            }
            task.deliver(payload);
        }
    }
    trace!(listener = ?task.id, channel = task.channel, "poller stopped");
}

/// Multi-listener event emitter layered over shared-memory channels.
///
/// Every registration owns one channel and one polling task. The engine
/// writes each emitted payload into every channel subscribed to the event
/// name; the polling task drains its channel on every tick and invokes the
/// listener with the decoded arguments.
///
/// Handles are cheap to clone and share one set of registrations. The
/// emitter is disposed by [`dispose`](Self::dispose) or when the last handle
/// is dropped.
///
/// # Ordering
///
/// Payloads on one channel arrive in write order. Nothing is guaranteed
/// across two listeners of the same event.
///
/// # Example
///
/// ```ignore
/// let emitter = EventEmitter::new(engine, Some("fs"), &BusConfig::default())?;
/// let id = emitter.on("evt", |args| println!("{args:?}"))?;
/// emitter.emit("evt", vec![json!("a"), json!(1)]);
/// emitter.remove_listener("evt", id);
/// ```
#[derive(Clone)]
pub struct EventEmitter {
    inner: Arc<EmitterInner>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("name", &self.inner.name)
            .field("listeners", &self.inner.registrations.lock().len())
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Attaches to the engine emitter table `name`, or to a fresh anonymous one.
    pub fn new(
        engine: Arc<dyn Engine>,
        name: Option<&str>,
        config: &BusConfig,
    ) -> Result<Self> {
        if !engine.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}{}", ANONYMOUS_EMITTER_PREFIX, nanoid!()));
        if config.max_listeners > 0 {
            engine.set_max_listeners(&name, config.max_listeners);
        }

        Ok(Self {
            inner: Arc::new(EmitterInner {
                name,
                registry: ChannelRegistry::new(engine),
                registrations: Mutex::new(Vec::new()),
                poll_interval: config.poll_interval(),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn register(
        &self,
        event: &str,
        listener: Listener,
        mode: SubscribeMode,
        once: bool,
    ) -> Result<ListenerId> {
        let inner = &self.inner;
        let runtime = Handle::try_current()
            .map_err(|e| Error::Fatal(format!("listener polling requires a tokio runtime: {e}")))?;

        // Held until the push: `dispose` flips the flag under this lock, and a
        // `once` poller can't look the record up before it exists.
        let mut registrations = inner.registrations.lock();
        if inner.disposed.load(Ordering::Acquire) {
            return Err(Error::Disposed(inner.name.clone()));
        }

        let channel = inner.registry.allocate()?;
        if let Err(e) = inner.engine().subscribe(&inner.name, event, channel, mode, once) {
            inner.registry.free(channel);
            return Err(e);
        }

        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();
        let task = PollTask {
            id,
            event: event.to_string(),
            channel,
            once,
            cancel: cancel.clone(),
            listener,
        };

        runtime.spawn(poll_channel(Arc::downgrade(inner), task, inner.poll_interval));
        registrations.push(Registration {
            id,
            event: event.to_string(),
            channel,
            cancel,
        });
        debug!(emitter = %inner.name, event, listener = ?id, channel, once, "listener registered");
        Ok(id)
    }

    pub fn on<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), SubscribeMode::Append, false)
    }

    pub fn add_listener<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.on(event, listener)
    }

    /// Fires at most once, even when several payloads land before the next tick.
    pub fn once<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), SubscribeMode::Append, true)
    }

    pub fn prepend_listener<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), SubscribeMode::Prepend, false)
    }

    pub fn prepend_once_listener<F>(
        &self,
        event: &str,
        listener: F,
    ) -> Result<ListenerId>
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(listener), SubscribeMode::Prepend, true)
    }

    /// Removes the registration `id` of `event`. Returns false when nothing matched.
    pub fn remove_listener(
        &self,
        event: &str,
        id: ListenerId,
    ) -> bool {
        self.inner.remove_where(|r| r.id == id && r.event == event, true) > 0
    }

    pub fn off(
        &self,
        event: &str,
        id: ListenerId,
    ) -> bool {
        self.remove_listener(event, id)
    }

    /// Removes every registration of `event`, or every registration when `None`.
    pub fn remove_all_listeners(
        &self,
        event: Option<&str>,
    ) -> usize {
        match event {
            Some(event) => self.inner.remove_where(|r| r.event == event, false),
            None => self.inner.remove_where(|_| true, false),
        }
    }

    /// Publishes `args` to every channel subscribed to `event`.
    ///
    /// Always returns true: delivery is not acknowledged.
    pub fn emit(
        &self,
        event: &str,
        args: Vec<Value>,
    ) -> bool {
        self.emit_raw(event, Payload::encode(&args))
    }

    /// Publishes an already encoded payload, e.g. a bare diagnostic string.
    pub fn emit_raw(
        &self,
        event: &str,
        payload: String,
    ) -> bool {
        if let Err(e) = self.inner.engine().multicast(&self.inner.name, event, payload) {
            warn!(emitter = %self.inner.name, event, "emit failed: {:?}", e);
        }
        true
    }

    pub fn listener_count(
        &self,
        event: &str,
    ) -> usize {
        self.inner
            .registrations
            .lock()
            .iter()
            .filter(|r| r.event == event)
            .count()
    }

    /// Names with at least one active registration, in first-registration order
    pub fn event_names(&self) -> Vec<String> {
        let registrations = self.inner.registrations.lock();
        let mut names: Vec<String> = Vec::new();
        for r in registrations.iter() {
            if !names.contains(&r.event) {
                names.push(r.event.clone());
            }
        }
        names
    }

    /// Registrations of `event` in engine delivery order (prepended ones first)
    pub fn listeners(
        &self,
        event: &str,
    ) -> Vec<ListenerId> {
        let channels = self.inner.engine().subscribed_channels(&self.inner.name, event);
        let registrations = self.inner.registrations.lock();
        channels
            .into_iter()
            .filter_map(|channel| {
                registrations
                    .iter()
                    .find(|r| r.channel == channel && r.event == event)
                    .map(|r| r.id)
            })
            .collect()
    }

    pub fn raw_listeners(
        &self,
        event: &str,
    ) -> Vec<ListenerId> {
        self.listeners(event)
    }

    /// 0 means unlimited
    pub fn set_max_listeners(
        &self,
        limit: usize,
    ) -> &Self {
        self.inner.engine().set_max_listeners(&self.inner.name, limit);
        self
    }

    pub fn get_max_listeners(&self) -> usize {
        self.inner.engine().get_max_listeners(&self.inner.name)
    }

    /// Channels currently held by this emitter; equals the number of active registrations
    pub fn allocated_channels(&self) -> usize {
        self.inner.registry.allocated_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Frees every registration and detaches from the engine table.
    /// Affects all clones of this handle. Calling it again is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}
