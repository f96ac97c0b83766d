use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::Error;
use crate::EventKind;
use crate::MockNotifier;
use crate::NotificationTarget;
use crate::SchedulingError;
use crate::SwitchError;
use crate::SwitchState;
use crate::WatchdogConfig;

fn config(
    interval_ms: u64,
    retrigger_interval_ms: Option<u64>,
) -> WatchdogConfig {
    let mut config = WatchdogConfig::default();
    config.switch.interval_ms = interval_ms;
    config.switch.retrigger_interval_ms = retrigger_interval_ms;
    config.notification.targets = vec![NotificationTarget::Log];
    config.engine.shutdown_grace_period_ms = 100;
    config
}

fn silent_notifier() -> MockNotifier {
    let mut notifier = MockNotifier::new();
    notifier.expect_deliver().returning(|_, _| Ok(()));
    notifier
}

fn watchdog(
    config: WatchdogConfig,
    notifier: MockNotifier,
) -> Watchdog {
    WatchdogBuilder::new(config)
        .notifier(Arc::new(notifier))
        .build()
        .expect("watchdog builds")
}

#[tokio::test]
async fn test_register_hands_out_distinct_armed_switches() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());

    let a = watchdog.register().unwrap();
    let b = watchdog.register().unwrap();
    assert_ne!(a, b);

    let snapshot = watchdog.get(&a).unwrap();
    assert_eq!(snapshot.state, SwitchState::Armed);
    assert_eq!(snapshot.interval_ms, 60_000);
    assert_eq!(snapshot.retrigger_interval_ms, 60_000);
    assert!(snapshot.protected);
    assert_eq!(snapshot.channels, vec!["log"]);
}

#[tokio::test]
async fn test_ping_unknown_id_is_not_found() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    watchdog.register().unwrap();

    let err = watchdog.ping("no-such-switch").unwrap_err();
    assert!(matches!(err, Error::Switch(SwitchError::NotFound(ref id)) if id == "no-such-switch"));
    assert!(err.is_client_error());
    assert_eq!(watchdog.health().switches, 1);
}

#[tokio::test]
async fn test_register_with_custom_interval_uses_it_for_retrigger() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());

    let snapshot = watchdog
        .register_with(Some(Duration::from_millis(5_000)), None)
        .unwrap();
    assert_eq!(snapshot.interval_ms, 5_000);
    assert_eq!(snapshot.retrigger_interval_ms, 5_000);
}

#[tokio::test]
async fn test_register_with_keeps_configured_retrigger() {
    let watchdog = watchdog(config(60_000, Some(1_000)), silent_notifier());

    let custom = watchdog
        .register_with(Some(Duration::from_millis(5_000)), None)
        .unwrap();
    assert_eq!(custom.retrigger_interval_ms, 1_000);

    let explicit = watchdog
        .register_with(None, Some(Duration::from_millis(250)))
        .unwrap();
    assert_eq!(explicit.interval_ms, 60_000);
    assert_eq!(explicit.retrigger_interval_ms, 250);
}

#[tokio::test]
async fn test_register_with_zero_interval_is_rejected() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());

    let err = watchdog.register_with(Some(Duration::ZERO), None).unwrap_err();
    assert!(matches!(err, Error::Switch(SwitchError::InvalidSpec(_))));
    assert!(watchdog.engine().registry().is_empty());
}

#[tokio::test]
async fn test_remove_then_ping_is_not_found() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    let id = watchdog.register().unwrap();

    let removed = watchdog.remove(&id).unwrap();
    assert_eq!(removed.state, SwitchState::Disabled);
    assert!(!removed.protected);

    assert!(matches!(
        watchdog.ping(&id),
        Err(Error::Switch(SwitchError::NotFound(_)))
    ));
    assert!(matches!(
        watchdog.remove(&id),
        Err(Error::Switch(SwitchError::NotFound(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_silent_switch_trips_and_ping_rearms() {
    let trips = Arc::new(AtomicUsize::new(0));
    let trips_clone = trips.clone();
    let mut notifier = MockNotifier::new();
    notifier.expect_deliver().returning(move |_, event| {
        assert_eq!(event.kind, EventKind::Trip);
        trips_clone.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let watchdog = watchdog(config(2_000, Some(10_000)), notifier);
    let id = watchdog.register().unwrap();

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert_eq!(trips.load(Ordering::SeqCst), 1);
    let tripped = watchdog.get(&id).unwrap();
    assert_eq!(tripped.state, SwitchState::Tripped);
    assert_eq!(tripped.trip_count, 1);

    let rearmed = watchdog.ping(&id).unwrap();
    assert_eq!(rearmed.state, SwitchState::Armed);
    assert_eq!(rearmed.trip_count, 0);
    assert!(rearmed.last_reset >= tripped.last_reset);
}

#[tokio::test]
async fn test_health_reports_ok_until_shutdown() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    watchdog.register().unwrap();
    watchdog.register().unwrap();

    let health = watchdog.health();
    assert_eq!(health.status, HealthStatus::Ok);
    assert_eq!(health.switches, 2);
    assert_eq!(health.pending_deadlines, 2);
    assert_eq!(health.unprotected_switches, 0);

    let report = watchdog.shutdown().await;
    assert_eq!(report.cancelled_deadlines, 2);
    assert!(report.drained);

    let health = watchdog.health();
    assert_eq!(health.status, HealthStatus::ShuttingDown);
    assert_eq!(health.pending_deadlines, 0);
}

#[tokio::test]
async fn test_deadline_capacity_bounds_registration() {
    let mut config = config(60_000, None);
    config.engine.max_pending_deadlines = 1;
    let watchdog = watchdog(config, silent_notifier());

    let a = watchdog.register().unwrap();
    // second registration cannot get a timer and is refused outright
    assert!(matches!(
        watchdog.register(),
        Err(Error::Scheduling(SchedulingError::CapacityExhausted { max: 1 }))
    ));
    assert_eq!(watchdog.health().status, HealthStatus::Ok);

    // a ping releases the old permit before re-arming, so it stays protected
    let snapshot = watchdog.ping(&a).unwrap();
    assert!(snapshot.protected);
    assert_eq!(watchdog.health().status, HealthStatus::Ok);
}

#[tokio::test]
async fn test_register_after_shutdown_fails() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    watchdog.shutdown().await;

    assert!(matches!(
        watchdog.register(),
        Err(Error::Scheduling(SchedulingError::EngineStopped))
    ));
}

#[tokio::test]
async fn test_refresh_gauges_copies_registry_state() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    watchdog.register().unwrap();

    watchdog.refresh_gauges();
    assert!(crate::metrics::gather_text().contains("deadswitch_switches"));
}

#[tokio::test]
async fn test_stop_timers_before_shutdown_keeps_cancelled_count() {
    let watchdog = watchdog(config(60_000, None), silent_notifier());
    watchdog.register().unwrap();
    watchdog.register().unwrap();

    assert_eq!(watchdog.stop_timers(), 2);
    assert!(watchdog.engine().is_stopped());
    assert!(watchdog.register().is_err());

    let report = watchdog.shutdown().await;
    assert_eq!(report.cancelled_deadlines, 2);
    assert!(report.drained);
}
