//! The gateway over a real socket, alerting a real webhook receiver.
mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::config;
use common::spawn_webhook_receiver;
use common::watchdog;
use common::RecordingNotifier;
use deadswitch::gateway;
use deadswitch::NotificationTarget;
use deadswitch::Watchdog;
use deadswitch::WatchdogBuilder;
use reqwest::StatusCode;
use tokio::sync::watch;
use tokio::time::sleep;

fn serve_ephemeral(watchdog: Arc<Watchdog>) -> SocketAddr {
    let (addr, server) = warp::serve(gateway::routes(watchdog)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

#[tokio::test]
async fn register_ping_and_inspect_over_http() {
    let watchdog = watchdog(config(60_000, 60_000), RecordingNotifier::new());
    let addr = serve_ephemeral(watchdog.clone());
    let client = reqwest::Client::new();

    let res = client.get(format!("http://{addr}/id")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let id = res.text().await.unwrap();

    let res = client
        .post(format!("http://{addr}/ping/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("http://{addr}/ping/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let snapshot: serde_json::Value = client
        .get(format!("http://{addr}/switch/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["state"], "armed");
    assert_eq!(snapshot["interval_ms"], 60_000);

    let version = client
        .get(format!("http://{addr}/version"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(version, format!("v{}", env!("CARGO_PKG_VERSION")));

    let metrics = client
        .get(format!("http://{addr}/metrics"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(metrics.contains("deadswitch_pings_total"));
}

#[tokio::test]
async fn silent_switch_alerts_webhook_receiver() {
    let (receiver, captured) = spawn_webhook_receiver();
    let mut config = config(200, 150);
    config.notification.targets = vec![NotificationTarget::Webhook {
        url: format!("http://{receiver}/alerts"),
    }];
    let config = config.validate().unwrap();
    let watchdog = Arc::new(WatchdogBuilder::new(config).build().unwrap());
    let addr = serve_ephemeral(watchdog.clone());

    let id = reqwest::get(format!("http://{addr}/id"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    sleep(Duration::from_millis(450)).await;
    watchdog.shutdown().await;

    let bodies = captured.lock().clone();
    assert!(bodies.len() >= 2, "expected trip and retrigger, got {bodies:?}");
    assert_eq!(bodies[0]["switch_id"], id.as_str());
    assert_eq!(bodies[0]["kind"], "trip");
    assert_eq!(bodies[0]["sequence"], 1);
    assert_eq!(bodies[1]["kind"], "retrigger");
}

#[tokio::test]
async fn serve_returns_after_shutdown_signal() {
    let watchdog = watchdog(config(60_000, 60_000), RecordingNotifier::new());
    watchdog.register().unwrap();
    let (graceful_tx, graceful_rx) = watch::channel(());

    let server = tokio::spawn(gateway::serve(
        watchdog.clone(),
        ([127, 0, 0, 1], 0).into(),
        graceful_rx,
    ));
    sleep(Duration::from_millis(50)).await;
    graceful_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("gateway stops within timeout")
        .unwrap();
    assert!(result.is_ok());

    // timers stopped with the signal, before the drain below
    assert!(watchdog.engine().is_stopped());
    assert_eq!(watchdog.health().pending_deadlines, 0);
    assert!(watchdog.register().is_err());
    assert_eq!(watchdog.shutdown().await.cancelled_deadlines, 1);
}
