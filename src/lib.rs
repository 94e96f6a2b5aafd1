//! Event bus and lock-aware scheduling over a shared memory region.
//!
//! Several execution contexts map one memory region that holds a
//! single-writer filesystem engine, an advisory lock flag and a table of
//! numbered channels. This crate builds the consumer side on top of that:
//!
//! - [`LockAwareScheduler`] retries operations that hit the engine while it
//!   is mutating, with exponential backoff;
//! - [`ChannelRegistry`] hands out channels and decodes their payloads;
//! - [`EventEmitter`] offers named-event, multi-listener pub/sub where every
//!   registration is one channel drained by one polling task;
//! - [`WatchHub`] and [`Watcher`] filter the engine's shared change feed by
//!   path.
//!
//! [`SharedRegion`] is the in-process region used when no external engine
//! is attached, and by the tests.

mod bus;
mod config;
pub mod constants;
mod errors;
pub mod metrics;
mod region;
mod scheduler;
mod utils;
mod watch;

pub use bus::*;
pub use self::config::*;
pub use errors::*;
pub use region::*;
pub use scheduler::LockAwareScheduler;
pub use watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
