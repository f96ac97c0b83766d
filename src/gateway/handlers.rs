use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;
use tracing::error;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::Rejection;
use warp::Reply;

use crate::metrics::gather_text;
use crate::watchdog::HealthStatus;
use crate::watchdog::Watchdog;
use crate::Error;
use crate::SwitchError;

/// Optional per-switch timing on `GET /id`
#[derive(Debug, Default, Deserialize)]
pub struct RegisterParams {
    pub interval_ms: Option<u64>,
    pub retrigger_interval_ms: Option<u64>,
}

impl RegisterParams {
    fn is_empty(&self) -> bool {
        self.interval_ms.is_none() && self.retrigger_interval_ms.is_none()
    }
}

pub(super) async fn register(
    params: RegisterParams,
    watchdog: Arc<Watchdog>,
) -> Result<Response, Infallible> {
    let result = if params.is_empty() {
        watchdog.register()
    } else {
        watchdog
            .register_with(
                params.interval_ms.map(Duration::from_millis),
                params.retrigger_interval_ms.map(Duration::from_millis),
            )
            .map(|snapshot| snapshot.id)
    };

    Ok(match result {
        Ok(id) => id.into_response(),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn ping(
    id: String,
    watchdog: Arc<Watchdog>,
) -> Result<Response, Infallible> {
    Ok(match watchdog.ping(&id) {
        Ok(_) => "ok".into_response(),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn version() -> Result<Response, Infallible> {
    Ok(format!("v{}", env!("CARGO_PKG_VERSION")).into_response())
}

pub(super) async fn metrics(watchdog: Arc<Watchdog>) -> Result<Response, Infallible> {
    watchdog.refresh_gauges();
    Ok(gather_text().into_response())
}

pub(super) async fn get_switch(
    id: String,
    watchdog: Arc<Watchdog>,
) -> Result<Response, Infallible> {
    Ok(match watchdog.get(&id) {
        Ok(snapshot) => warp::reply::json(&snapshot).into_response(),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn remove_switch(
    id: String,
    watchdog: Arc<Watchdog>,
) -> Result<Response, Infallible> {
    Ok(match watchdog.remove(&id) {
        Ok(snapshot) => warp::reply::json(&snapshot).into_response(),
        Err(e) => error_reply(&e),
    })
}

pub(super) async fn health(watchdog: Arc<Watchdog>) -> Result<Response, Infallible> {
    let report = watchdog.health();
    let status = match report.status {
        HealthStatus::Ok => StatusCode::OK,
        HealthStatus::Degraded | HealthStatus::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };
    Ok(warp::reply::with_status(warp::reply::json(&report), status).into_response())
}

/// Maps filter rejections (unknown route, bad query string) to plain-text replies.
pub(super) async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let status = if rejection.is_not_found() {
        StatusCode::NOT_FOUND
    } else if rejection.find::<warp::reject::InvalidQuery>().is_some() {
        StatusCode::BAD_REQUEST
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else {
        error!("unhandled rejection: {:?}", rejection);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok(warp::reply::with_status(
        status.canonical_reason().unwrap_or_default().to_string(),
        status,
    )
    .into_response())
}

/// Status code an operation error is reported with
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Switch(SwitchError::NotFound(_)) => StatusCode::NOT_FOUND,
        Error::Switch(SwitchError::InvalidSpec(_)) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_reply(err: &Error) -> Response {
    let status = status_for(err);
    if err.is_client_error() {
        debug!(%status, "request refused: {}", err);
    } else {
        error!(%status, "request failed: {}", err);
    }
    warp::reply::with_status(err.to_string(), status).into_response()
}
