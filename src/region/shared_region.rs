use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::trace;

use super::ChannelId;
use super::Engine;
use super::SubscribeMode;
use crate::Error;
use crate::Result;

#[derive(Debug, Default)]
struct ChannelSlot {
    held: bool,
    queue: VecDeque<String>,
}

#[derive(Debug, Clone, Copy)]
struct Subscription {
    channel: ChannelId,
    once: bool,
}

#[derive(Debug, Default)]
struct NativeEmitter {
    /// Event name -> subscriptions in delivery order
    slots: Vec<(String, Vec<Subscription>)>,
    /// 0 means unlimited
    limit: usize,
}

impl NativeEmitter {
    fn subscriptions_mut(
        &mut self,
        event: &str,
    ) -> Option<&mut Vec<Subscription>> {
        self.slots.iter_mut().find(|(name, _)| name == event).map(|(_, subs)| subs)
    }

    fn subscriptions(
        &self,
        event: &str,
    ) -> Option<&Vec<Subscription>> {
        self.slots.iter().find(|(name, _)| name == event).map(|(_, subs)| subs)
    }

    fn is_empty(&self) -> bool {
        self.slots.iter().all(|(_, subs)| subs.is_empty())
    }
}

/// In-process model of the memory block every execution context maps.
///
/// Holds the advisory lock flag, a recycled table of single-consumer channel
/// slots and the named emitter tables the engine multicasts through.
/// Channel ids are slot indexes: freeing a channel makes its index the first
/// candidate for the next allocation.
#[derive(Debug)]
pub struct SharedRegion {
    mapped: AtomicBool,
    lock: AtomicBool,
    channels: Mutex<Vec<ChannelSlot>>,
    emitters: DashMap<String, NativeEmitter>,
}

impl Default for SharedRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRegion {
    /// Creates a region that is already mapped
    pub fn new() -> Self {
        let region = Self::unmapped();
        region.map();
        region
    }

    /// Creates a region that rejects channel allocation until [`map`](Self::map)
    pub fn unmapped() -> Self {
        Self {
            mapped: AtomicBool::new(false),
            lock: AtomicBool::new(false),
            channels: Mutex::new(Vec::new()),
            emitters: DashMap::new(),
        }
    }

    pub fn map(&self) {
        self.mapped.store(true, Ordering::Release);
    }

    pub fn unmap(&self) {
        self.mapped.store(false, Ordering::Release);
    }

    /// Engine side: raise or clear the advisory lock flag
    pub fn set_locked(
        &self,
        held: bool,
    ) {
        self.lock.store(held, Ordering::Release);
    }

    /// Engine side: hold the lock flag for the lifetime of the guard
    pub fn lock_guard(&self) -> EngineLockGuard<'_> {
        self.set_locked(true);
        EngineLockGuard { region: self }
    }

    /// Engine side: serialize `args` as one payload and multicast it
    pub fn raise(
        &self,
        emitter: &str,
        event: &str,
        args: Vec<Value>,
    ) -> Result<()> {
        self.multicast(emitter, event, Value::Array(args).to_string())
    }

    /// Delivers `payload` to one held channel
    pub fn send(
        &self,
        to: ChannelId,
        payload: String,
    ) {
        let mut channels = self.channels.lock();
        if let Some(slot) = channels.get_mut(to).filter(|slot| slot.held) {
            slot.queue.push_back(payload);
        }
    }

    /// Delivers `payload` to every held channel except `from`
    pub fn broadcast(
        &self,
        from: ChannelId,
        payload: String,
    ) {
        let mut channels = self.channels.lock();
        for (_, slot) in channels
            .iter_mut()
            .enumerate()
            .filter(|(id, slot)| *id != from && slot.held)
        {
            slot.queue.push_back(payload.clone());
        }
    }

    /// Delivers `payload` to every held channel
    pub fn send_all(
        &self,
        payload: String,
    ) {
        let mut channels = self.channels.lock();
        for slot in channels.iter_mut().filter(|slot| slot.held) {
            slot.queue.push_back(payload.clone());
        }
    }

    pub fn held_channel_count(&self) -> usize {
        self.channels.lock().iter().filter(|slot| slot.held).count()
    }

    pub fn pending_payloads(
        &self,
        id: ChannelId,
    ) -> usize {
        self.channels
            .lock()
            .get(id)
            .filter(|slot| slot.held)
            .map(|slot| slot.queue.len())
            .unwrap_or(0)
    }

    /// Logs the channel table and every emitter table
    pub fn diagnostics(&self) {
        {
            let channels = self.channels.lock();
            for (id, slot) in channels.iter().enumerate() {
                info!(channel = id, held = slot.held, pending = slot.queue.len(), "channel slot");
            }
        }
        for entry in self.emitters.iter() {
            for (event, subs) in entry.value().slots.iter() {
                info!(
                    emitter = %entry.key(),
                    event = %event,
                    subscriptions = ?subs,
                    limit = entry.value().limit,
                    "emitter table"
                );
            }
        }
    }

    /// Drops every channel and emitter table. Not safe while listeners are live.
    pub fn reboot(&self) {
        self.channels.lock().clear();
        self.emitters.clear();
        self.set_locked(false);
        debug!("shared region rebooted");
    }
}

impl Engine for SharedRegion {
    fn is_initialized(&self) -> bool {
        self.mapped.load(Ordering::Acquire)
    }

    fn lock_is_held(&self) -> bool {
        self.lock.load(Ordering::Acquire)
    }

    fn allocate_channel(&self) -> Result<ChannelId> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let mut channels = self.channels.lock();
        if let Some((id, slot)) = channels.iter_mut().enumerate().find(|(_, slot)| !slot.held) {
            slot.held = true;
            return Ok(id);
        }
        channels.push(ChannelSlot {
            held: true,
            queue: VecDeque::new(),
        });
        Ok(channels.len() - 1)
    }

    fn free_channel(
        &self,
        id: ChannelId,
    ) {
        if let Some(slot) = self.channels.lock().get_mut(id) {
            slot.queue.clear();
            slot.held = false;
        }
    }

    fn receive_channel(
        &self,
        id: ChannelId,
    ) -> Option<String> {
        self.channels
            .lock()
            .get_mut(id)
            .filter(|slot| slot.held)
            .and_then(|slot| slot.queue.pop_front())
    }

    fn subscribe(
        &self,
        emitter: &str,
        event: &str,
        channel: ChannelId,
        mode: SubscribeMode,
        once: bool,
    ) -> Result<()> {
        let mut table = self.emitters.entry(emitter.to_string()).or_default();
        let limit = table.limit;
        let subscription = Subscription { channel, once };
        match table.subscriptions_mut(event) {
            Some(subs) => {
                if limit > 0 && subs.len() >= limit {
                    return Err(Error::TooManyListeners {
                        event: event.to_string(),
                        limit,
                    });
                }
                match mode {
                    SubscribeMode::Append => subs.push(subscription),
                    SubscribeMode::Prepend => subs.insert(0, subscription),
                }
            }
            None => table.slots.push((event.to_string(), vec![subscription])),
        }
        trace!(emitter, event, channel, ?mode, once, "subscribed");
        Ok(())
    }

    fn unsubscribe(
        &self,
        emitter: &str,
        event: &str,
        channel: ChannelId,
    ) {
        if let Some(mut table) = self.emitters.get_mut(emitter) {
            if let Some(subs) = table.subscriptions_mut(event) {
                subs.retain(|sub| sub.channel != channel);
            }
        }
    }

    fn multicast(
        &self,
        emitter: &str,
        event: &str,
        payload: String,
    ) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }
        let Some(mut table) = self.emitters.get_mut(emitter) else {
            return Ok(());
        };
        let Some(subs) = table.subscriptions_mut(event) else {
            return Ok(());
        };
        let mut channels = self.channels.lock();
        subs.retain(|sub| {
            if let Some(slot) = channels.get_mut(sub.channel).filter(|slot| slot.held) {
                slot.queue.push_back(payload.clone());
            }
            !sub.once
        });
        Ok(())
    }

    fn subscribed_channels(
        &self,
        emitter: &str,
        event: &str,
    ) -> Vec<ChannelId> {
        self.emitters
            .get(emitter)
            .and_then(|table| {
                table
                    .subscriptions(event)
                    .map(|subs| subs.iter().map(|sub| sub.channel).collect())
            })
            .unwrap_or_default()
    }

    fn set_max_listeners(
        &self,
        emitter: &str,
        limit: usize,
    ) {
        self.emitters.entry(emitter.to_string()).or_default().limit = limit;
    }

    fn get_max_listeners(
        &self,
        emitter: &str,
    ) -> usize {
        self.emitters.get(emitter).map(|table| table.limit).unwrap_or(0)
    }

    fn release_emitter(
        &self,
        emitter: &str,
    ) {
        self.emitters.remove_if(emitter, |_, table| table.is_empty());
    }
}

/// Keeps the advisory lock flag raised until dropped
pub struct EngineLockGuard<'a> {
    region: &'a SharedRegion,
}

impl Drop for EngineLockGuard<'_> {
    fn drop(&mut self) {
        self.region.set_locked(false);
    }
}
