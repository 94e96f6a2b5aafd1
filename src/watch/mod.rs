//! Path-scoped change notification on top of the event bus.
//!
//! The engine raises `"change"`, `"rename"` and `"watch_"` on one shared
//! feed emitter. Each [`Watcher`] is a listener on that feed plus an emitter
//! of its own: matching feed events are re-emitted locally as `"change"`,
//! where the user callback listens.
//!
//! ```text
//! engine ──"change"/"rename"──► feed ("fs") ──path filter──► watcher ──► callback
//!        ──"watch_" [path, prev, curr]──►   ──zero-fill───►         ──► callback(curr, prev)
//! ```

mod hub;
mod stat;
mod watcher;


pub use hub::*;
pub use stat::*;
pub use watcher::*;

use crate::constants::CHANGE_EVENT;
use crate::constants::RENAME_EVENT;

/// Kind of a path event reported on the shared feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchEventKind {
    Change,
    Rename,
}

impl WatchEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WatchEventKind::Change => CHANGE_EVENT,
            WatchEventKind::Rename => RENAME_EVENT,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            CHANGE_EVENT => Some(WatchEventKind::Change),
            RENAME_EVENT => Some(WatchEventKind::Rename),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Match every affected path that starts with the watched path
    pub recursive: bool,
}
