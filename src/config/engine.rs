use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Timer engine bounds and shutdown behavior
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Hard cap on concurrently pending deadline tasks.
    /// Arming beyond it is a scheduling failure, not a panic.
    #[serde(default = "default_max_pending_deadlines")]
    pub max_pending_deadlines: usize,

    /// Time in-flight notification dispatches get to finish on shutdown
    #[serde(default = "default_shutdown_grace_period_ms")]
    pub shutdown_grace_period_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pending_deadlines: default_max_pending_deadlines(),
            shutdown_grace_period_ms: default_shutdown_grace_period_ms(),
        }
    }
}

impl EngineConfig {
    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_period_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_pending_deadlines == 0 {
            return Err(Error::Config(ConfigError::Message(
                "engine.max_pending_deadlines must be > 0".into(),
            )));
        }

        if self.shutdown_grace_period_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "engine.shutdown_grace_period_ms must be > 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_max_pending_deadlines() -> usize {
    100_000
}

fn default_shutdown_grace_period_ms() -> u64 {
    5000
}
