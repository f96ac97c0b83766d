use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::utils::time::millis;
use crate::utils::time::unix_millis;
use crate::DeadlineHandle;
use crate::DeadlineKind;
use crate::NotificationTarget;
use crate::Result;
use crate::SwitchConfig;
use crate::SwitchError;

/// Opaque switch identifier handed out by `GET /id`
pub type SwitchId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    /// Waiting for a ping before the interval elapses
    Armed,
    /// Interval elapsed without a ping; alerts repeat until the next ping
    Tripped,
    /// Removed; no timer, no further events
    Disabled,
}

/// Immutable parameters of a switch, fixed at creation
#[derive(Debug, Clone)]
pub struct SwitchSpec {
    pub interval: Duration,
    pub retrigger_interval: Duration,
    pub targets: Arc<[NotificationTarget]>,
}

impl SwitchSpec {
    /// `retrigger_interval` falls back to `interval` when not given.
    pub fn new(
        interval: Duration,
        retrigger_interval: Option<Duration>,
        targets: Arc<[NotificationTarget]>,
    ) -> Result<Self> {
        let retrigger_interval = retrigger_interval.unwrap_or(interval);
        if interval.is_zero() {
            return Err(SwitchError::InvalidSpec("interval must be > 0".into()).into());
        }
        if retrigger_interval.is_zero() {
            return Err(SwitchError::InvalidSpec("retrigger interval must be > 0".into()).into());
        }
        Ok(Self {
            interval,
            retrigger_interval,
            targets,
        })
    }

    pub fn from_config(
        config: &SwitchConfig,
        targets: Arc<[NotificationTarget]>,
    ) -> Result<Self> {
        Self::new(config.interval(), Some(config.retrigger_interval()), targets)
    }
}

/// Registry-owned state of one monitored switch.
///
/// Only reachable through the per-switch mutex inside the registry.
#[derive(Debug)]
pub(crate) struct Switch {
    pub(crate) id: SwitchId,
    pub(crate) spec: SwitchSpec,
    pub(crate) state: SwitchState,
    pub(crate) created_at: SystemTime,
    pub(crate) last_reset: SystemTime,
    /// Trip + retrigger events emitted since the last reset
    pub(crate) trip_count: u64,
    pub(crate) generation: u64,
    /// The single pending timer; `None` only after a scheduling failure,
    /// on removal, or once shutdown cancelled it
    pub(crate) deadline: Option<DeadlineHandle>,
    pub(crate) cancel: CancellationToken,
}

impl Switch {
    pub(crate) fn new(
        id: SwitchId,
        spec: SwitchSpec,
    ) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            spec,
            state: SwitchState::Armed,
            created_at: now,
            last_reset: now,
            trip_count: 0,
            generation: 0,
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn is_protected(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn snapshot(&self) -> SwitchSnapshot {
        SwitchSnapshot {
            id: self.id.clone(),
            state: self.state,
            interval_ms: millis(self.spec.interval),
            retrigger_interval_ms: millis(self.spec.retrigger_interval),
            created_at_ms: unix_millis(self.created_at),
            last_reset_ms: unix_millis(self.last_reset),
            last_reset: self.last_reset,
            trip_count: self.trip_count,
            channels: self.spec.targets.iter().map(|t| t.channel()).collect(),
            next_deadline: self.deadline.as_ref().map(|h| NextDeadline {
                kind: h.deadline().kind,
                remaining_ms: millis(h.deadline().remaining()),
            }),
            protected: self.is_protected(),
        }
    }
}

/// Point-in-time copy of a switch for diagnostics and API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchSnapshot {
    pub id: SwitchId,
    pub state: SwitchState,
    pub interval_ms: u64,
    pub retrigger_interval_ms: u64,
    pub created_at_ms: u64,
    pub last_reset_ms: u64,
    #[serde(skip)]
    pub last_reset: SystemTime,
    pub trip_count: u64,
    pub channels: Vec<&'static str>,
    pub next_deadline: Option<NextDeadline>,
    /// False when the last arm attempt failed and no timer guards the switch
    pub protected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextDeadline {
    pub kind: DeadlineKind,
    pub remaining_ms: u64,
}
