use std::sync::Arc;

use dashmap::DashSet;
use serde_json::Value;
use tracing::debug;

use crate::metrics::CHANNELS_ALLOCATED;
use crate::metrics::PAYLOADS_RAW_FALLBACK;
use crate::ChannelId;
use crate::Engine;
use crate::Result;

/// One decoded channel message.
///
/// Producers emit either a JSON array of arguments or a bare diagnostic
/// string. The variant is decided once, when the payload leaves the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Vec<Value>),
    Raw(String),
}

impl Payload {
    pub fn decode(raw: String) -> Self {
        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(args) => Payload::Structured(args),
            Err(_) => {
                PAYLOADS_RAW_FALLBACK.inc();
                Payload::Raw(raw)
            }
        }
    }

    pub fn encode(args: &[Value]) -> String {
        Value::Array(args.to_vec()).to_string()
    }

    /// Listener arguments: the decoded list, or the raw string as the only argument
    pub fn into_args(self) -> Vec<Value> {
        match self {
            Payload::Structured(args) => args,
            Payload::Raw(raw) => vec![Value::String(raw)],
        }
    }
}

/// Tracks the channels one façade holds in the shared region.
///
/// This registry is the only writer of "which ids are allocated" on the
/// consumer side; the engine stays the only writer of the payload slots.
pub struct ChannelRegistry {
    engine: Arc<dyn Engine>,
    allocated: DashSet<ChannelId>,
}

impl std::fmt::Debug for ChannelRegistry {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ChannelRegistry").field("allocated", &self.allocated).finish()
    }
}

impl ChannelRegistry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            allocated: DashSet::new(),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Requests a fresh channel. Fails with `NotInitialized` before the region is mapped.
    pub fn allocate(&self) -> Result<ChannelId> {
        let id = self.engine.allocate_channel()?;
        self.allocated.insert(id);
        CHANNELS_ALLOCATED.inc();
        debug!(channel = id, "channel allocated");
        Ok(id)
    }

    /// Non-blocking; `None` means no message this tick.
    pub fn receive(
        &self,
        id: ChannelId,
    ) -> Option<Payload> {
        if !self.allocated.contains(&id) {
            return None;
        }
        self.engine.receive_channel(id).map(Payload::decode)
    }

    /// Returns the channel to the engine. Freeing an unknown id is a no-op.
    pub fn free(
        &self,
        id: ChannelId,
    ) {
        if self.allocated.remove(&id).is_some() {
            self.engine.free_channel(id);
            CHANNELS_ALLOCATED.dec();
            debug!(channel = id, "channel freed");
        }
    }

    pub fn is_allocated(
        &self,
        id: ChannelId,
    ) -> bool {
        self.allocated.contains(&id)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}
