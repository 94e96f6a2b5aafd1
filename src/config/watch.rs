use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Shared feed and watcher lifecycle settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Name of the engine emitter raising `change`, `rename` and `watch_`
    #[serde(default = "default_feed_name")]
    pub feed_name: String,

    /// How long a closed watcher keeps its `close` listeners alive
    /// (unit: milliseconds)
    ///
    /// **Default**: 20
    #[serde(default = "default_close_linger_ms")]
    pub close_linger_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            feed_name: default_feed_name(),
            close_linger_ms: default_close_linger_ms(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feed_name.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "watch.feed_name must not be empty".into(),
            )));
        }
        Ok(())
    }

    pub fn close_linger(&self) -> Duration {
        Duration::from_millis(self.close_linger_ms)
    }
}

fn default_feed_name() -> String {
    "fs".to_string()
}
fn default_close_linger_ms() -> u64 {
    20
}
