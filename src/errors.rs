//! Shared Memory Bus Error Hierarchy
//!
//! Failures surfaced by the channel registry, the publish/subscribe façade
//! and the watcher layer. Contention reported by a scheduled operation is
//! never mapped into this type: the scheduler hands back the operation's own
//! error once its attempt budget is spent.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The shared memory region has not been mapped into this context yet
    #[error("shared memory region is not initialized")]
    NotInitialized,

    /// The engine-side emitter table refused another subscription
    #[error("Too many listeners for event `{event}` (limit: {limit})")]
    TooManyListeners { event: String, limit: usize },

    /// Registration attempted on an emitter that was already disposed
    #[error("Emitter `{0}` has been disposed")]
    Disposed(String),

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}
