//! Timer Engine
//!
//! One tokio task per pending deadline. A task sleeps until its due instant
//! and then asks the registry to apply the expiry; the registry decides,
//! under the switch lock, whether the fire is still current. Notification
//! I/O is handed to the dispatcher, never awaited here.
//!
//! ```text
//! Armed   --(interval elapses)--------> Tripped  [Trip]
//! Armed   --(ping)--------------------> Armed    [deadline = now + interval]
//! Tripped --(retrigger interval)------> Tripped  [Retrigger]
//! Tripped --(ping)--------------------> Armed    [retrigger cancelled]
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::sleep_until;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics::DEADLINES_ARMED;
use crate::metrics::PINGS;
use crate::metrics::SCHEDULING_FAILURES;
use crate::metrics::TRIPS_FIRED;
use crate::Deadline;
use crate::DeadlineHandle;
use crate::DeadlineScheduler;
use crate::EngineConfig;
use crate::Error;
use crate::NotificationDispatcher;
use crate::Result;
use crate::SchedulingError;
use crate::SwitchError;
use crate::SwitchId;
use crate::SwitchRegistry;
use crate::SwitchSnapshot;
use crate::SwitchSpec;

struct EngineInner {
    registry: Arc<SwitchRegistry>,
    dispatcher: NotificationDispatcher,
    permits: Arc<Semaphore>,
    max_pending: usize,
    shutdown: CancellationToken,
}

/// Arms, re-arms and fires switch deadlines.
///
/// Cheap to clone; every deadline task holds a clone.
#[derive(Clone)]
pub struct TimerEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("pending", &self.pending_deadlines())
            .field("max_pending", &self.inner.max_pending)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

impl TimerEngine {
    pub fn new(
        registry: Arc<SwitchRegistry>,
        dispatcher: NotificationDispatcher,
        config: &EngineConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry,
                dispatcher,
                permits: Arc::new(Semaphore::new(config.max_pending_deadlines)),
                max_pending: config.max_pending_deadlines,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SwitchRegistry> {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.inner.dispatcher
    }

    /// Creates a switch and arms its first deadline at `now + interval`.
    pub fn arm(
        &self,
        spec: SwitchSpec,
    ) -> Result<SwitchSnapshot> {
        self.inner.registry.create(spec, self)
    }

    /// Ping: cancels whatever timer is pending and re-arms `now + interval`.
    pub fn reset(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        match self.inner.registry.reset(id, self) {
            Ok(snapshot) => {
                PINGS.with_label_values(&["ok"]).inc();
                debug!(switch_id = %id, "ping");
                Ok(snapshot)
            }
            Err(Error::Switch(SwitchError::NotFound(missing))) => {
                PINGS.with_label_values(&["not_found"]).inc();
                debug!(switch_id = %missing, "ping for unknown switch");
                Err(SwitchError::NotFound(missing).into())
            }
            Err(e) => Err(e),
        }
    }

    /// Removes a switch and cancels its timer.
    pub fn disarm(
        &self,
        id: &str,
    ) -> Result<SwitchSnapshot> {
        self.inner.registry.remove(id)
    }

    /// Stops accepting new deadlines and cancels every pending one.
    ///
    /// Returns the number of cancelled deadlines. Idempotent.
    pub fn shutdown(&self) -> usize {
        self.inner.shutdown.cancel();
        let cancelled = self.inner.registry.cancel_all();
        info!(cancelled, "timer engine stopped");
        cancelled
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Deadline tasks currently holding a capacity permit
    pub fn pending_deadlines(&self) -> usize {
        self.inner.max_pending - self.inner.permits.available_permits()
    }

    fn on_deadline(
        &self,
        id: &SwitchId,
        fired: Deadline,
    ) {
        let Some(notice) = self.inner.registry.mark_tripped(id, fired, self) else {
            return;
        };

        let kind = notice.event.kind;
        TRIPS_FIRED.with_label_values(&[kind.as_str()]).inc();
        warn!(
            switch_id = %id,
            kind = %kind,
            sequence = notice.event.sequence,
            "switch expired without ping"
        );
        self.inner.dispatcher.dispatch(notice);
    }
}

impl DeadlineScheduler for TimerEngine {
    fn schedule(
        &self,
        switch_id: &SwitchId,
        deadline: Deadline,
    ) -> std::result::Result<DeadlineHandle, SchedulingError> {
        let result = self.try_schedule(switch_id, deadline);
        match &result {
            Ok(_) => DEADLINES_ARMED
                .with_label_values(&[deadline.kind.as_str()])
                .inc(),
            // expected during shutdown
            Err(SchedulingError::EngineStopped) => {
                debug!(switch_id = %switch_id, "engine stopped; deadline not armed")
            }
            Err(e) => {
                SCHEDULING_FAILURES.inc();
                error!(
                    switch_id = %switch_id,
                    kind = deadline.kind.as_str(),
                    "scheduling failure: {}", e
                );
            }
        }
        result
    }
}

impl TimerEngine {
    fn try_schedule(
        &self,
        switch_id: &SwitchId,
        deadline: Deadline,
    ) -> std::result::Result<DeadlineHandle, SchedulingError> {
        if self.is_stopped() {
            return Err(SchedulingError::EngineStopped);
        }

        let permit = self.inner.permits.clone().try_acquire_owned().map_err(|_| {
            SchedulingError::CapacityExhausted {
                max: self.inner.max_pending,
            }
        })?;

        let runtime = Handle::try_current().map_err(|_| SchedulingError::NoRuntime)?;

        let engine = self.clone();
        let id = switch_id.clone();
        let stop = self.inner.shutdown.clone();
        let task = runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = stop.cancelled() => {}
                _ = sleep_until(deadline.due) => engine.on_deadline(&id, deadline),
            }
        });

        Ok(DeadlineHandle::new(
            deadline,
            Some(task.abort_handle()),
            Some(permit),
        ))
    }
}
