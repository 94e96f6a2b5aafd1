use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::BACKOFF_STARTING_DELAY_MS;
use crate::Error;
use crate::Result;

/// Retry policy of the lock-aware scheduler.
///
/// Only these three knobs are recognized; the starting delay (100ms) and
/// the doubling factor are fixed.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Sleep before the very first attempt as well
    #[serde(default)]
    pub delay_first_attempt: bool,

    /// Total number of attempts, the first one included
    #[serde(default = "default_num_of_attempts")]
    pub num_of_attempts: usize,

    /// Upper bound of a single delay (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            delay_first_attempt: false,
            num_of_attempts: default_num_of_attempts(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.num_of_attempts == 0 {
            return Err(Error::Config(ConfigError::Message(
                "backoff.num_of_attempts must be at least 1".into(),
            )));
        }
        if self.max_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "backoff.max_delay_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay slept before the second attempt, clamped to `max_delay`
    pub fn starting_delay(&self) -> Duration {
        Duration::from_millis(BACKOFF_STARTING_DELAY_MS.min(self.max_delay_ms))
    }
}

fn default_num_of_attempts() -> usize {
    100
}
fn default_max_delay_ms() -> u64 {
    60_000
}
