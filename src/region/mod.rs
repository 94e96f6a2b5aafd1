//! Engine-facing side of the shared memory region.
//!
//! The filesystem engine owns the lock flag, the channel slots and the named
//! emitter tables. Everything above this module only talks to the engine
//! through [`Engine`], so the façade and the scheduler can run against the
//! in-process [`SharedRegion`] or against a mock.

mod shared_region;

#[cfg(test)]
mod shared_region_test;

pub use shared_region::*;

#[cfg(test)]
use mockall::automock;

use crate::Result;

/// Identifier of a channel slot in the shared region
pub type ChannelId = usize;

/// Where a new subscription lands in the engine's per-event list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    Append,
    Prepend,
}

#[cfg_attr(test, automock)]
pub trait Engine: Send + Sync + 'static {
    /// True once the region is mapped into this context
    fn is_initialized(&self) -> bool;

    /// Advisory flag raised by the engine while a mutation is in progress
    fn lock_is_held(&self) -> bool;

    fn allocate_channel(&self) -> Result<ChannelId>;

    /// Discards pending payloads and returns the slot to the pool
    fn free_channel(
        &self,
        id: ChannelId,
    );

    /// Pops the oldest payload, never blocks
    fn receive_channel(
        &self,
        id: ChannelId,
    ) -> Option<String>;

    fn subscribe(
        &self,
        emitter: &str,
        event: &str,
        channel: ChannelId,
        mode: SubscribeMode,
        once: bool,
    ) -> Result<()>;

    fn unsubscribe(
        &self,
        emitter: &str,
        event: &str,
        channel: ChannelId,
    );

    /// Writes `payload` into every channel subscribed to `event`
    fn multicast(
        &self,
        emitter: &str,
        event: &str,
        payload: String,
    ) -> Result<()>;

    fn subscribed_channels(
        &self,
        emitter: &str,
        event: &str,
    ) -> Vec<ChannelId>;

    fn set_max_listeners(
        &self,
        emitter: &str,
        limit: usize,
    );

    fn get_max_listeners(
        &self,
        emitter: &str,
    ) -> usize;

    /// Forgets the emitter table once nothing is subscribed to it anymore
    fn release_emitter(
        &self,
        emitter: &str,
    );
}
