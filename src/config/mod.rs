//! Configuration management for the watchdog process.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file named by `CONFIG_PATH`
//! - Environment variable overrides (`DEADSWITCH__` prefix)
//! - Component-wise validation
//!
//! The loaded value is an immutable snapshot: switch defaults and notification
//! targets are read once at startup and handed to the registry, timer engine
//! and dispatcher constructors.
mod engine;
mod logging;
mod notification;
mod retry;
mod server;
mod switch;
pub use engine::*;
pub use logging::*;
pub use notification::*;
pub use retry::*;
pub use server::*;
pub use switch::*;
#[cfg(test)]
mod config_test;

use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "DEADSWITCH";

/// Main configuration container for the watchdog
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct WatchdogConfig {
    /// HTTP gateway bind settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Default switch timing and registry bounds
    #[serde(default)]
    pub switch: SwitchConfig,
    /// Notification targets and delivery policy
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Timer engine bounds and shutdown behavior
    #[serde(default)]
    pub engine: EngineConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Debug for WatchdogConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("WatchdogConfig")
            .field("server", &self.server)
            .field("switch", &self.switch)
            .field("targets", &self.notification.targets.len())
            .finish()
    }
}

impl WatchdogConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `DEADSWITCH__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so `with_override_config()` can still be applied.
    /// Callers MUST call `validate()` before using the configuration.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("DEADSWITCH__SWITCH__INTERVAL_MS", "30000");
    /// let cfg = WatchdogConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path).required(true))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// # Errors
    /// Returns the first violation found in any subsystem:
    /// - Zero intervals or bounds
    /// - Unparseable bind address
    /// - Malformed notification target URLs
    /// - Inconsistent backoff policy
    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.switch.validate()?;
        self.notification.validate()?;
        self.engine.validate()?;
        self.logging.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
