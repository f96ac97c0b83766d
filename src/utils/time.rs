use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

/// Milliseconds since the unix epoch; clamps pre-epoch clocks to 0
pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Advances `current` to now, never backwards.
///
/// A wall clock step back (NTP correction) keeps the previous value.
pub(crate) fn advance_to_now(current: SystemTime) -> SystemTime {
    current.max(SystemTime::now())
}

pub(crate) fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}
