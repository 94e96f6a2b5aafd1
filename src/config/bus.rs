use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Channel polling parameters of the publish/subscribe façade
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Interval between two polls of a listener channel (unit: milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Listener limit applied to each new emitter (0 means unlimited)
    #[serde(default)]
    pub max_listeners: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_listeners: 0,
        }
    }
}

impl BusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "bus.poll_interval_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn default_poll_interval_ms() -> u64 {
    1
}
