use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Defaults applied to switches registered without explicit timing
///
/// ```toml
/// [switch]
/// interval_ms = 60000            # silence tolerated before the first alert
/// retrigger_interval_ms = 300000 # optional, repeats the alert; defaults to interval_ms
/// max_switches = 10000
/// ```
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SwitchConfig {
    /// Maximum silence before a switch trips (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Re-alert cadence while tripped (milliseconds).
    /// Falls back to `interval_ms` when unset.
    #[serde(default)]
    pub retrigger_interval_ms: Option<u64>,

    /// Upper bound on live switches; registration beyond it is refused
    #[serde(default = "default_max_switches")]
    pub max_switches: usize,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            retrigger_interval_ms: None,
            max_switches: default_max_switches(),
        }
    }
}

impl SwitchConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn retrigger_interval(&self) -> Duration {
        Duration::from_millis(self.retrigger_interval_ms.unwrap_or(self.interval_ms))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "switch.interval_ms must be > 0".into(),
            )));
        }

        if self.retrigger_interval_ms == Some(0) {
            return Err(Error::Config(ConfigError::Message(
                "switch.retrigger_interval_ms must be > 0 when set".into(),
            )));
        }

        if self.max_switches == 0 {
            return Err(Error::Config(ConfigError::Message(
                "switch.max_switches must be > 0".into(),
            )));
        }

        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    60_000
}

fn default_max_switches() -> usize {
    10_000
}
