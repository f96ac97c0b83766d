//! Prometheus collectors for the watchdog core.
//!
//! All collectors live in a dedicated [`REGISTRY`] so `/metrics` only exposes
//! watchdog series. Counters are process-wide; they carry observations, never
//! configuration.

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;


const NAMESPACE: &str = "deadswitch";

lazy_static! {
    pub static ref SWITCHES: IntGauge = IntGauge::with_opts(
        Opts::new("switches", "Live switches in the registry").namespace(NAMESPACE)
    )
    .expect("metric can not be created");

    pub static ref PENDING_DEADLINES: IntGauge = IntGauge::with_opts(
        Opts::new("pending_deadlines", "Deadline timers currently armed").namespace(NAMESPACE)
    )
    .expect("metric can not be created");

    pub static ref UNPROTECTED_SWITCHES: IntGauge = IntGauge::with_opts(
        Opts::new(
            "unprotected_switches",
            "Switches left without a deadline after a scheduling failure"
        )
        .namespace(NAMESPACE)
    )
    .expect("metric can not be created");

    pub static ref DEADLINES_ARMED: IntCounterVec = IntCounterVec::new(
        Opts::new("deadlines_armed_total", "Deadline timers armed, by kind").namespace(NAMESPACE),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref TRIPS_FIRED: IntCounterVec = IntCounterVec::new(
        Opts::new("trips_total", "Trip and retrigger events fired").namespace(NAMESPACE),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref PINGS: IntCounterVec = IntCounterVec::new(
        Opts::new("pings_total", "Pings received, by outcome").namespace(NAMESPACE),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("notifications_total", "Notification deliveries, by channel and outcome")
            .namespace(NAMESPACE),
        &["channel", "outcome"]
    )
    .expect("metric can not be created");

    pub static ref SCHEDULING_FAILURES: IntCounter = IntCounter::with_opts(
        Opts::new("scheduling_failures_total", "Deadlines that could not be armed")
            .namespace(NAMESPACE)
    )
    .expect("metric can not be created");

    pub static ref NOTIFICATION_LATENCY_MS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "notification_latency_ms",
            "Time from dispatch to final delivery outcome in ms"
        )
        .namespace(NAMESPACE)
        .buckets(exponential_buckets(5.0, 2.0, 12).expect("valid buckets")),
        &["channel"]
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_custom_metrics(&registry);
        registry
    };
}

pub(crate) fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(SWITCHES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PENDING_DEADLINES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(UNPROTECTED_SWITCHES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(DEADLINES_ARMED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(TRIPS_FIRED.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(PINGS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(NOTIFICATIONS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(SCHEDULING_FAILURES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(NOTIFICATION_LATENCY_MS.clone()))
        .expect("collector can be registered");
}

/// Export metrics for Prometheus to scrape
pub fn gather_text() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}
