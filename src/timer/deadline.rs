use serde::Serialize;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::AbortHandle;
use tokio::time::Duration;
use tokio::time::Instant;

use crate::SchedulingError;
use crate::SwitchId;

/// Which timer a deadline stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadlineKind {
    /// Liveness window after creation or the last ping
    Armed,
    /// Re-alert cadence while tripped
    Retrigger,
}

impl DeadlineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeadlineKind::Armed => "armed",
            DeadlineKind::Retrigger => "retrigger",
        }
    }
}

/// One scheduled expiry.
///
/// `generation` identifies the deadline within its switch. The registry bumps
/// the switch generation on every reset, trip and removal, so a fire carrying
/// an older generation is stale and must be ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub generation: u64,
    pub kind: DeadlineKind,
    pub due: Instant,
}

impl Deadline {
    pub fn remaining(&self) -> Duration {
        self.due.saturating_duration_since(Instant::now())
    }
}

/// Ownership of a pending deadline task.
///
/// Dropping the handle aborts the task and releases its capacity permit, so
/// replacing the handle stored on a switch is enough to cancel the old timer.
#[derive(Debug)]
pub struct DeadlineHandle {
    deadline: Deadline,
    task: Option<AbortHandle>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl DeadlineHandle {
    pub(crate) fn new(
        deadline: Deadline,
        task: Option<AbortHandle>,
        permit: Option<OwnedSemaphorePermit>,
    ) -> Self {
        Self {
            deadline,
            task,
            _permit: permit,
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }
}

impl Drop for DeadlineHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Arms deadlines on behalf of the registry.
///
/// The registry calls this while holding the switch lock, so implementations
/// must not block or await.
pub trait DeadlineScheduler: Send + Sync {
    fn schedule(
        &self,
        switch_id: &SwitchId,
        deadline: Deadline,
    ) -> std::result::Result<DeadlineHandle, SchedulingError>;
}
