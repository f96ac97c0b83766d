use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing::Instrument;

use super::Notifier;
use super::SwitchEvent;
use crate::metrics::NOTIFICATIONS;
use crate::metrics::NOTIFICATION_LATENCY_MS;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::BackoffPolicy;
use crate::NotificationTarget;
use crate::Result;

/// Everything the dispatcher needs to fan out one trip or retrigger.
///
/// Built by the registry under the switch lock; handed over after the lock
/// is released.
#[derive(Debug, Clone)]
pub struct TripNotice {
    pub event: SwitchEvent,
    pub targets: Arc<[NotificationTarget]>,
    /// Cancelled when the switch is removed; results of in-flight sends are then dropped
    pub cancel: CancellationToken,
}

/// Outcome of delivering one event to one target
#[derive(Debug)]
pub struct DeliveryReport {
    pub target: NotificationTarget,
    pub result: Result<()>,
    pub elapsed: Duration,
}

impl DeliveryReport {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Fans trip events out to notification targets.
///
/// Each target is attempted independently with its own timeout and bounded
/// retries; one failing target never delays or fails the others. Dispatch is
/// fire-and-forget for the timer engine: [`NotificationDispatcher::dispatch`]
/// only spawns a tracked task.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    policy: BackoffPolicy,
    tracker: TaskTracker,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("policy", &self.policy)
            .field("in_flight", &self.tracker.len())
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            notifier,
            policy,
            tracker: TaskTracker::new(),
        }
    }

    /// Delivers `event` to every target and reports per-target results in target order.
    ///
    /// No new attempt starts after `cancel` fires.
    pub async fn send(
        &self,
        event: &SwitchEvent,
        targets: &[NotificationTarget],
        cancel: &CancellationToken,
    ) -> Vec<DeliveryReport> {
        let deliveries = targets.iter().map(|target| async move {
            let started = Instant::now();
            let result = task_with_timeout_and_exponential_backoff(
                || self.notifier.deliver(target, event),
                self.policy,
                cancel,
            )
            .await;
            DeliveryReport {
                target: target.clone(),
                result,
                elapsed: started.elapsed(),
            }
        });

        join_all(deliveries).await
    }

    /// Spawns delivery of `notice` and returns immediately.
    pub fn dispatch(
        &self,
        notice: TripNotice,
    ) {
        if notice.targets.is_empty() {
            debug!(switch_id = %notice.event.switch_id, "no targets; nothing to dispatch");
            return;
        }

        let dispatcher = self.clone();
        self.tracker
            .spawn(async move { dispatcher.deliver(notice).await }.in_current_span());
    }

    /// Sends `notice` and records the outcome.
    ///
    /// Returns `None` when the switch was removed meanwhile: the results are
    /// then dropped without touching metrics or delivery logs.
    pub(crate) async fn deliver(
        &self,
        notice: TripNotice,
    ) -> Option<Vec<DeliveryReport>> {
        let reports = self
            .send(&notice.event, &notice.targets, &notice.cancel)
            .await;

        if notice.cancel.is_cancelled() {
            debug!(
                switch_id = %notice.event.switch_id,
                "switch removed while notifying; discarding delivery results"
            );
            return None;
        }

        record(&notice.event, &reports);
        Some(reports)
    }

    /// Number of dispatch tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for in-flight dispatches, at most `grace`.
    ///
    /// Returns false when the grace period ran out first.
    pub async fn drain(
        &self,
        grace: Duration,
    ) -> bool {
        self.tracker.close();
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    in_flight = self.tracker.len(),
                    "notification dispatch did not finish within {:?}", grace
                );
                false
            }
        }
    }
}

fn record(
    event: &SwitchEvent,
    reports: &[DeliveryReport],
) {
    for report in reports {
        let channel = report.target.channel();
        NOTIFICATION_LATENCY_MS
            .with_label_values(&[channel])
            .observe(report.elapsed.as_secs_f64() * 1000.0);

        match &report.result {
            Ok(()) => {
                NOTIFICATIONS.with_label_values(&[channel, "delivered"]).inc();
                info!(
                    switch_id = %event.switch_id,
                    kind = %event.kind,
                    channel,
                    "notification delivered"
                );
            }
            Err(e) => {
                NOTIFICATIONS.with_label_values(&[channel, "failed"]).inc();
                error!(
                    switch_id = %event.switch_id,
                    kind = %event.kind,
                    channel,
                    "notification failed: {}", e
                );
            }
        }
    }
}
