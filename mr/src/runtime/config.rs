//! Runtime configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Default receive timeout for the built-in behaviors, in milliseconds
    #[serde(rename = "receive-timeout-ms", default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    /// Buffer size of the behavior failure broadcast channel
    #[serde(rename = "failure-channel-capacity", default = "default_failure_channel_capacity")]
    pub failure_channel_capacity: usize,
}

fn default_receive_timeout_ms() -> u64 {
    debug!("default_receive_timeout_ms: called");
    10_000
}

fn default_failure_channel_capacity() -> usize {
    debug!("default_failure_channel_capacity: called");
    64
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        debug!("RuntimeConfig::default: called");
        Self {
            receive_timeout_ms: 10_000,
            failure_channel_capacity: 64,
        }
    }
}

impl RuntimeConfig {
    /// Get the default receive timeout as a Duration
    pub fn receive_timeout(&self) -> Duration {
        debug!(receive_timeout_ms = %self.receive_timeout_ms, "RuntimeConfig::receive_timeout: called");
        Duration::from_millis(self.receive_timeout_ms)
    }
}
