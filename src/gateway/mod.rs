//! HTTP gateway
//!
//! | Route                       | Operation                         |
//! |-----------------------------|-----------------------------------|
//! | `GET /id`                   | register a switch, body is the id |
//! | `GET`/`POST /ping/{id}`     | reset the switch                  |
//! | `GET /version`              | build version                     |
//! | `GET /metrics`              | prometheus text exposition        |
//! | `GET`/`DELETE /switch/{id}` | snapshot / administrative removal |
//! | `GET /health`               | 200 healthy, 503 otherwise        |
mod handlers;

pub use handlers::status_for;
pub use handlers::RegisterParams;


use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use warp::Filter;
use warp::Reply;

use crate::watchdog::Watchdog;

/// All gateway routes, including the rejection handler.
pub fn routes(
    watchdog: Arc<Watchdog>
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let register = warp::path!("id")
        .and(warp::get())
        .and(warp::query::<RegisterParams>())
        .and(with_watchdog(watchdog.clone()))
        .and_then(handlers::register);

    let ping = warp::path!("ping" / String)
        .and(warp::get().or(warp::post()).unify())
        .and(with_watchdog(watchdog.clone()))
        .and_then(handlers::ping);

    let version = warp::path!("version")
        .and(warp::get())
        .and_then(handlers::version);

    let metrics = warp::path!("metrics")
        .and(warp::get())
        .and(with_watchdog(watchdog.clone()))
        .and_then(handlers::metrics);

    let get_switch = warp::path!("switch" / String)
        .and(warp::get())
        .and(with_watchdog(watchdog.clone()))
        .and_then(handlers::get_switch);

    let remove_switch = warp::path!("switch" / String)
        .and(warp::delete())
        .and(with_watchdog(watchdog.clone()))
        .and_then(handlers::remove_switch);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_watchdog(watchdog))
        .and_then(handlers::health);

    register
        .or(ping)
        .or(version)
        .or(metrics)
        .or(get_switch)
        .or(remove_switch)
        .or(health)
        .recover(handlers::handle_rejection)
        .with(warp::trace::request())
}

/// Serves the gateway until `shutdown_signal` changes or its sender is dropped.
///
/// Timers stop as soon as the signal arrives, before open requests drain, so
/// no request can arm a deadline once shutdown has begun.
pub async fn serve(
    watchdog: Arc<Watchdog>,
    addr: SocketAddr,
    mut shutdown_signal: watch::Receiver<()>,
) -> crate::Result<()> {
    let stopping = watchdog.clone();
    let (bound, server) = warp::serve(routes(watchdog))
        .try_bind_with_graceful_shutdown(addr, async move {
            let _ = shutdown_signal.changed().await;
            let cancelled = stopping.stop_timers();
            info!(cancelled, "timer engine stopped; draining gateway");
        })
        .map_err(|e| crate::Error::Fatal(format!("gateway could not bind {}: {}", addr, e)))?;

    info!(%bound, "gateway listening");
    server.await;
    info!("gateway stopped");
    Ok(())
}

fn with_watchdog(
    watchdog: Arc<Watchdog>
) -> impl Filter<Extract = (Arc<Watchdog>,), Error = Infallible> + Clone {
    warp::any().map(move || watchdog.clone())
}
