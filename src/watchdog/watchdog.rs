use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::metrics::PENDING_DEADLINES;
use crate::metrics::SWITCHES;
use crate::metrics::UNPROTECTED_SWITCHES;
use crate::Result;
use crate::SwitchId;
use crate::SwitchSnapshot;
use crate::SwitchSpec;
use crate::TimerEngine;
use crate::WatchdogConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// At least one switch has no timer guarding it
    Degraded,
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub switches: usize,
    pub pending_deadlines: usize,
    pub unprotected_switches: usize,
    pub notifications_in_flight: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub cancelled_deadlines: usize,
    /// False when in-flight notifications outlived the grace period
    pub drained: bool,
}

/// The watchdog core: switch registry, timer engine and dispatcher behind
/// the operations the gateway exposes.
#[derive(Debug)]
pub struct Watchdog {
    engine: TimerEngine,
    defaults: SwitchSpec,
    config: WatchdogConfig,
    cancelled_deadlines: AtomicUsize,
}

impl Watchdog {
    pub(crate) fn new(
        engine: TimerEngine,
        defaults: SwitchSpec,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            engine,
            defaults,
            config,
            cancelled_deadlines: AtomicUsize::new(0),
        }
    }

    /// Registers a switch with the configured defaults and returns its id.
    pub fn register(&self) -> Result<SwitchId> {
        self.engine.arm(self.defaults.clone()).map(|s| s.id)
    }

    /// Registers a switch with per-switch timing.
    ///
    /// A missing `retrigger_interval` falls back to the configured retrigger
    /// interval when one is set, otherwise to the effective interval.
    pub fn register_with(
        &self,
        interval: Option<Duration>,
        retrigger_interval: Option<Duration>,
    ) -> Result<SwitchSnapshot> {
        let effective_interval = interval.unwrap_or(self.defaults.interval);
        let retrigger_interval = retrigger_interval.or_else(|| {
            match (interval, self.config.switch.retrigger_interval_ms) {
                (Some(_), None) => None,
                _ => Some(self.defaults.retrigger_interval),
            }
        });
        let spec = SwitchSpec::new(
            effective_interval,
            retrigger_interval,
            self.defaults.targets.clone(),
        )?;
        self.engine.arm(spec)
    }

    pub fn ping(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        self.engine.reset(id)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        self.engine.registry().get(id)
    }

    pub fn remove(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        self.engine.disarm(id)
    }

    pub fn health(&self) -> HealthReport {
        let registry = self.engine.registry();
        let unprotected_switches = registry.unprotected();
        let status = if self.engine.is_stopped() {
            HealthStatus::ShuttingDown
        } else if unprotected_switches > 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        HealthReport {
            status,
            switches: registry.len(),
            pending_deadlines: registry.pending_deadlines(),
            unprotected_switches,
            notifications_in_flight: self.engine.dispatcher().in_flight(),
        }
    }

    /// Copies registry state into the gauges; called before each scrape.
    pub fn refresh_gauges(&self) {
        let registry = self.engine.registry();
        SWITCHES.set(registry.len() as i64);
        PENDING_DEADLINES.set(registry.pending_deadlines() as i64);
        UNPROTECTED_SWITCHES.set(registry.unprotected() as i64);
    }

    /// Stops the timer engine: new arms are refused and pending deadlines are
    /// cancelled. Returns the number cancelled by this call.
    pub fn stop_timers(&self) -> usize {
        let cancelled = self.engine.shutdown();
        self.cancelled_deadlines.fetch_add(cancelled, Ordering::SeqCst);
        cancelled
    }

    /// Stops arming timers, cancels pending deadlines, then gives in-flight
    /// notifications the configured grace period.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.stop_timers();
        let cancelled_deadlines = self.cancelled_deadlines.load(Ordering::SeqCst);
        let grace = self.config.engine.shutdown_grace_period();
        let drained = self.engine.dispatcher().drain(grace).await;
        if drained {
            info!(cancelled_deadlines, "watchdog stopped");
        } else {
            warn!(
                cancelled_deadlines,
                "watchdog stopped with notifications still in flight"
            );
        }
        ShutdownReport {
            cancelled_deadlines,
            drained,
        }
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }
}
