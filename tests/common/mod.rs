use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use deadswitch::EventKind;
use deadswitch::NotificationTarget;
use deadswitch::Notifier;
use deadswitch::Result;
use deadswitch::SwitchEvent;
use deadswitch::Watchdog;
use deadswitch::WatchdogBuilder;
use deadswitch::WatchdogConfig;
use parking_lot::Mutex;
use tokio::time::Instant;
use warp::Filter;

/// One observed delivery, timestamped in milliseconds since the recorder was created
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Delivery {
    pub at_ms: u64,
    pub switch_id: String,
    pub kind: EventKind,
    pub channel: &'static str,
}

pub struct RecordingNotifier {
    started: Instant,
    deliveries: Mutex<Vec<Delivery>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            deliveries: Mutex::new(Vec::new()),
        })
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().clone()
    }

    /// `(at_ms, kind)` for every delivery to `switch_id`
    pub fn timeline(
        &self,
        switch_id: &str,
    ) -> Vec<(u64, EventKind)> {
        self.deliveries
            .lock()
            .iter()
            .filter(|d| d.switch_id == switch_id)
            .map(|d| (d.at_ms, d.kind))
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(
        &self,
        target: &NotificationTarget,
        event: &SwitchEvent,
    ) -> Result<()> {
        self.deliveries.lock().push(Delivery {
            at_ms: Instant::now().duration_since(self.started).as_millis() as u64,
            switch_id: event.switch_id.clone(),
            kind: event.kind,
            channel: target.channel(),
        });
        Ok(())
    }
}

pub fn config(
    interval_ms: u64,
    retrigger_interval_ms: u64,
) -> WatchdogConfig {
    let mut config = WatchdogConfig::default();
    config.switch.interval_ms = interval_ms;
    config.switch.retrigger_interval_ms = Some(retrigger_interval_ms);
    config.notification.targets = vec![NotificationTarget::Log];
    config.engine.shutdown_grace_period_ms = 500;
    config
}

pub fn watchdog(
    config: WatchdogConfig,
    notifier: Arc<RecordingNotifier>,
) -> Arc<Watchdog> {
    let config = config.validate().expect("valid test config");
    Arc::new(
        WatchdogBuilder::new(config)
            .notifier(notifier)
            .build()
            .expect("watchdog builds"),
    )
}

pub type Captured = Arc<Mutex<Vec<serde_json::Value>>>;

/// Local webhook receiver recording every JSON body it is sent
#[allow(dead_code)]
pub fn spawn_webhook_receiver() -> (SocketAddr, Captured) {
    let captured: Captured = Arc::new(Mutex::new(Vec::new()));
    let sink = captured.clone();

    let route = warp::post()
        .and(warp::body::json())
        .map(move |body: serde_json::Value| {
            sink.lock().push(body);
            warp::reply()
        });

    let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    (addr, captured)
}
