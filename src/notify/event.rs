use std::fmt;

use serde::Serialize;

use crate::SwitchId;

/// Why a notification is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First expiry since the last reset
    Trip,
    /// Repeated alert while the switch stays tripped
    Retrigger,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Trip => "trip",
            EventKind::Retrigger => "retrigger",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to every notification channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchEvent {
    pub switch_id: SwitchId,
    pub kind: EventKind,
    /// 1 for the trip, 2.. for each retrigger since the last reset
    pub sequence: u64,
    pub interval_ms: u64,
    pub last_reset_ms: u64,
    pub fired_at_ms: u64,
}

impl SwitchEvent {
    /// Human readable one-liner for chat channels
    pub fn summary(&self) -> String {
        let silent_for_ms = self.fired_at_ms.saturating_sub(self.last_reset_ms);
        match self.kind {
            EventKind::Trip => format!(
                "Dead man's switch {} tripped: no ping for {}s (interval {}s)",
                self.switch_id,
                silent_for_ms / 1000,
                self.interval_ms / 1000
            ),
            EventKind::Retrigger => format!(
                "Dead man's switch {} still tripped (alert #{}): no ping for {}s",
                self.switch_id,
                self.sequence,
                silent_for_ms / 1000
            ),
        }
    }
}
