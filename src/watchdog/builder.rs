//! A builder for assembling a [`Watchdog`] from a validated configuration.
//!
//! The [`WatchdogBuilder`] wires the registry, timer engine and notification
//! dispatcher together. The HTTP notifier is the default transport; tests
//! and embedders can swap it with [`WatchdogBuilder::notifier`].
//!
//! ## Example
//! ```ignore
//! let config = WatchdogConfig::new()?.validate()?;
//! let watchdog = WatchdogBuilder::new(config).build()?;
//! let id = watchdog.register()?;
//! watchdog.ping(&id)?;
//! ```

use std::sync::Arc;

use tracing::info;

use super::Watchdog;
use crate::ChannelNotifier;
use crate::NotificationDispatcher;
use crate::NotificationTarget;
use crate::Notifier;
use crate::Result;
use crate::SwitchRegistry;
use crate::SwitchSpec;
use crate::TimerEngine;
use crate::WatchdogConfig;

pub struct WatchdogBuilder {
    config: WatchdogConfig,
    notifier: Option<Arc<dyn Notifier>>,
}

impl WatchdogBuilder {
    /// `config` is expected to be validated already.
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            notifier: None,
        }
    }

    /// Overrides the notification transport
    pub fn notifier(
        mut self,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn build(self) -> Result<Watchdog> {
        let targets: Arc<[NotificationTarget]> = self.config.notification.targets.clone().into();
        let defaults = SwitchSpec::from_config(&self.config.switch, targets)?;

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(ChannelNotifier::default()));
        let dispatcher = NotificationDispatcher::new(notifier, self.config.notification.retry);
        let registry = Arc::new(SwitchRegistry::new(self.config.switch.max_switches));
        let engine = TimerEngine::new(registry, dispatcher, &self.config.engine);

        info!(
            interval_ms = self.config.switch.interval_ms,
            retrigger_interval_ms = self.config.switch.retrigger_interval().as_millis() as u64,
            targets = defaults.targets.len(),
            "watchdog assembled"
        );

        Ok(Watchdog::new(engine, defaults, self.config))
    }
}
