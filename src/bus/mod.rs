//! Channel-based event bus.
//!
//! [`ChannelRegistry`] hands out single-consumer mailboxes in the shared
//! region and decodes what arrives in them; [`EventEmitter`] maps named,
//! multi-listener emitter semantics onto one channel plus one polling task
//! per registration.
//!
//! ```text
//! engine / emit() ──multicast──► channel 3 ──poll──► listener A
//!                           └──► channel 7 ──poll──► listener B (once)
//! ```

mod channel;
mod emitter;


pub use channel::*;
pub use emitter::*;
